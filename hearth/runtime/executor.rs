use hearth_backend::{BackendError, BackendResult, DeviceValue, ExecutionBackend};
use hearth_commands::action::{Action, ActionKind, Room};

/// What an executed action changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Execution {
    /// Backend writes performed.
    pub writes: usize,
    /// Whether the target was already in the requested state.
    pub already_in_state: bool,
}

/// Carries out an authorized action on `backend`.
///
/// A single-door action is one [`ExecutionBackend::set_door`] call, so the
/// read and the toggle land on the same adapter and nothing is toggled when
/// the door is already in the requested state. A device action on room `all`
/// writes `<room>.<device>` for every concrete room and fails on the first
/// failed write.
pub async fn execute(backend: &dyn ExecutionBackend, action: &Action) -> BackendResult<Execution> {
    match action.kind {
        ActionKind::Noop => Ok(Execution::default()),
        ActionKind::DoorLockAll => {
            backend.lock_all_doors().await?;
            Ok(Execution {
                writes: 1,
                already_in_state: false,
            })
        }
        ActionKind::DoorUnlockAll => {
            backend.unlock_all_doors().await?;
            Ok(Execution {
                writes: 1,
                already_in_state: false,
            })
        }
        ActionKind::DoorLock | ActionKind::DoorUnlock => {
            let door = action
                .door
                .ok_or_else(|| BackendError::rejected("door action without a door"))?;
            let toggled = backend
                .set_door(door.id(), action.kind == ActionKind::DoorLock)
                .await?;
            Ok(Execution {
                writes: usize::from(toggled),
                already_in_state: !toggled,
            })
        }
        ActionKind::DeviceSet => {
            let (Some(device), Some(value)) = (action.device, action.value) else {
                return Err(BackendError::rejected("device action without a target"));
            };
            let rooms = match action.room.unwrap_or(Room::MainHall) {
                Room::All => Room::CONCRETE.to_vec(),
                room => vec![room],
            };
            let value = DeviceValue::Switch(value.is_on());
            let mut writes = 0;
            for room in rooms {
                backend
                    .set_device_state(&device.key_in(room), value)
                    .await?;
                writes += 1;
            }
            Ok(Execution {
                writes,
                already_in_state: false,
            })
        }
    }
}
