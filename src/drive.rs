// drive.rs - Arrow-key state to differential drive packets
use crate::codec::encode_drive_packet;
use crate::link::SerialLink;
use thiserror::Error;

/// OI "Drive Direct": right wheel then left wheel, mm/s.
pub const DRIVE_DIRECT_OPCODE: u8 = 145;
pub const MAX_WHEEL_SPEED: i16 = 500;
pub const DEFAULT_VELOCITY_STEP: i16 = 100;
pub const DEFAULT_ROTATION_STEP: i16 = 100;

pub type DrivePacket = [u8; 5];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl KeyState {
    fn slot(&mut self, key: Key) -> &mut bool {
        match key {
            Key::Up => &mut self.up,
            Key::Down => &mut self.down,
            Key::Left => &mut self.left,
            Key::Right => &mut self.right,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("drive steps velocity={velocity} rotation={rotation} exceed the 500 mm/s wheel limit")]
pub struct InvalidSteps {
    pub velocity: i16,
    pub rotation: i16,
}

/// Per-axis step magnitudes. Validated so that no key combination can push
/// a wheel past `MAX_WHEEL_SPEED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveSteps {
    velocity: i16,
    rotation: i16,
}

impl DriveSteps {
    pub fn new(velocity: i16, rotation: i16) -> Result<Self, InvalidSteps> {
        let err = InvalidSteps { velocity, rotation };
        if velocity < 0 || rotation < 0 {
            return Err(err);
        }
        // rotation/2 contributes to each wheel on top of velocity
        if i32::from(velocity) + i32::from(rotation / 2) > i32::from(MAX_WHEEL_SPEED) {
            return Err(err);
        }
        Ok(Self { velocity, rotation })
    }

    pub fn velocity(&self) -> i16 {
        self.velocity
    }

    pub fn rotation(&self) -> i16 {
        self.rotation
    }
}

impl Default for DriveSteps {
    fn default() -> Self {
        Self {
            velocity: DEFAULT_VELOCITY_STEP,
            rotation: DEFAULT_ROTATION_STEP,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveCommand {
    pub velocity: i16,
    pub rotation: i16,
    pub right_wheel: i16,
    pub left_wheel: i16,
}

impl DriveCommand {
    pub fn from_keys(keys: &KeyState, steps: DriveSteps) -> Self {
        let axis = |plus: bool, minus: bool, step: i16| match (plus, minus) {
            (true, false) => step,
            (false, true) => -step,
            _ => 0,
        };
        let velocity = axis(keys.up, keys.down, steps.velocity);
        let rotation = axis(keys.left, keys.right, steps.rotation);

        // integer division truncates toward zero
        Self {
            velocity,
            rotation,
            right_wheel: velocity + rotation / 2,
            left_wheel: velocity - rotation / 2,
        }
    }

    pub fn packet(&self) -> DrivePacket {
        encode_drive_packet(DRIVE_DIRECT_OPCODE, self.right_wheel, self.left_wheel)
    }
}

/// Outcome of one key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transmission {
    Sent,
    /// Encoding matched the last packet sent; nothing written.
    Suppressed,
    /// Write attempted and failed; last-sent left untouched.
    Failed,
}

#[derive(Debug, Default)]
pub struct DriveState {
    keys: KeyState,
    steps: DriveSteps,
    last_sent: Option<DrivePacket>,
}

impl DriveState {
    pub fn new(steps: DriveSteps) -> Self {
        Self {
            keys: KeyState::default(),
            steps,
            last_sent: None,
        }
    }

    pub fn key_state(&self) -> KeyState {
        self.keys
    }

    pub fn command(&self) -> DriveCommand {
        DriveCommand::from_keys(&self.keys, self.steps)
    }

    pub fn last_sent(&self) -> Option<DrivePacket> {
        self.last_sent
    }

    /// Back to all keys released with nothing sent. Used whenever the link is
    /// replaced so a stale held key cannot resume motion.
    pub fn reset(&mut self) {
        self.keys = KeyState::default();
        self.last_sent = None;
    }

    /// Applies one key event and writes the resulting packet if it differs
    /// from the last one that reached the link.
    pub fn on_key(&mut self, key: Key, pressed: bool, link: &mut dyn SerialLink) -> Transmission {
        *self.keys.slot(key) = pressed;

        let command = self.command();
        let packet = command.packet();
        if self.last_sent == Some(packet) {
            log::debug!("Drive {:?} unchanged, suppressed", command);
            return Transmission::Suppressed;
        }

        match link.write(&packet) {
            Ok(()) => {
                log::debug!("Drive {:?} -> {:02X?}", command, packet);
                self.last_sent = Some(packet);
                Transmission::Sent
            }
            Err(e) => {
                log::warn!("Drive packet {:02X?} not sent: {}", packet, e);
                Transmission::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MemoryLink;

    const IDLE: DrivePacket = [145, 0, 0, 0, 0];

    fn rig() -> (DriveState, MemoryLink, MemoryLink) {
        let robot = MemoryLink::new();
        (DriveState::default(), robot.clone(), robot)
    }

    #[test]
    fn forward_sends_equal_wheels() {
        let (mut drive, mut link, robot) = rig();
        assert_eq!(drive.on_key(Key::Up, true, &mut link), Transmission::Sent);
        assert_eq!(robot.writes(), vec![vec![145, 0, 100, 0, 100]]);
    }

    #[test]
    fn opposite_keys_cancel() {
        let (mut drive, mut link, _) = rig();
        drive.on_key(Key::Up, true, &mut link);
        drive.on_key(Key::Down, true, &mut link);
        assert_eq!(drive.command().velocity, 0);

        drive.on_key(Key::Left, true, &mut link);
        drive.on_key(Key::Right, true, &mut link);
        assert_eq!(drive.command().rotation, 0);
        assert_eq!(drive.last_sent(), Some(IDLE));
    }

    #[test]
    fn left_turns_with_faster_right_wheel() {
        let (mut drive, mut link, _) = rig();
        drive.on_key(Key::Left, true, &mut link);
        let cmd = drive.command();
        assert_eq!((cmd.right_wheel, cmd.left_wheel), (50, -50));
        assert_eq!(drive.last_sent(), Some([145, 0x00, 0x32, 0xFF, 0xCE]));
    }

    #[test]
    fn repeated_press_is_sent_once() {
        let (mut drive, mut link, robot) = rig();
        assert_eq!(drive.on_key(Key::Up, true, &mut link), Transmission::Sent);
        assert_eq!(drive.on_key(Key::Up, true, &mut link), Transmission::Suppressed);
        assert_eq!(robot.writes().len(), 1);
    }

    #[test]
    fn releasing_unheld_key_changes_nothing() {
        let (mut drive, mut link, robot) = rig();
        drive.on_key(Key::Up, true, &mut link);
        let keys = drive.key_state();
        let last = drive.last_sent();

        assert_eq!(drive.on_key(Key::Right, false, &mut link), Transmission::Suppressed);
        assert_eq!(drive.key_state(), keys);
        assert_eq!(drive.last_sent(), last);
        assert_eq!(robot.writes().len(), 1);
    }

    #[test]
    fn consecutive_writes_always_differ() {
        let (mut drive, mut link, robot) = rig();
        drive.on_key(Key::Left, true, &mut link);
        drive.on_key(Key::Right, true, &mut link);
        drive.on_key(Key::Up, true, &mut link);
        drive.on_key(Key::Down, true, &mut link);
        drive.on_key(Key::Down, false, &mut link);
        drive.on_key(Key::Down, true, &mut link);
        let writes = robot.writes();
        // LEFT, LEFT+RIGHT (idle), UP, UP+DOWN (idle), UP, UP+DOWN (idle)
        assert_eq!(writes.len(), 6);
        for pair in writes.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn press_release_sequence_ends_idle() {
        let (mut drive, mut link, robot) = rig();
        drive.on_key(Key::Up, true, &mut link);
        drive.on_key(Key::Left, true, &mut link);
        drive.on_key(Key::Up, false, &mut link);
        drive.on_key(Key::Left, false, &mut link);

        assert_eq!(
            robot.writes(),
            vec![
                vec![145, 0x00, 0x64, 0x00, 0x64], // 100, 100
                vec![145, 0x00, 0x96, 0x00, 0x32], // 150, 50
                vec![145, 0x00, 0x32, 0xFF, 0xCE], // 50, -50
                IDLE.to_vec(),
            ]
        );
    }

    #[test]
    fn wheel_mix_holds_for_every_key_combination() {
        let steps = [
            DriveSteps::default(),
            DriveSteps::new(200, 75).unwrap(),
            DriveSteps::new(100, 75).unwrap(),
        ];
        for steps in &steps {
            for bits in 0u8..16 {
                let keys = KeyState {
                    up: bits & 1 != 0,
                    down: bits & 2 != 0,
                    left: bits & 4 != 0,
                    right: bits & 8 != 0,
                };
                let cmd = DriveCommand::from_keys(&keys, *steps);
                let rot = i32::from(cmd.rotation);
                let diff = i32::from(cmd.right_wheel) - i32::from(cmd.left_wheel);
                // exact when rotation is even, off by the truncated half otherwise
                assert!((diff - rot).abs() <= 1, "{keys:?} {cmd:?}");
                let sum = i32::from(cmd.right_wheel) + i32::from(cmd.left_wheel);
                assert_eq!(sum, 2 * i32::from(cmd.velocity), "{keys:?} {cmd:?}");
            }
        }
    }

    #[test]
    fn even_rotation_step_gives_exact_difference() {
        for bits in 0u8..16 {
            let keys = KeyState {
                up: bits & 1 != 0,
                down: bits & 2 != 0,
                left: bits & 4 != 0,
                right: bits & 8 != 0,
            };
            let cmd = DriveCommand::from_keys(&keys, DriveSteps::default());
            assert_eq!(cmd.right_wheel - cmd.left_wheel, cmd.rotation);
        }
    }

    #[test]
    fn failed_write_is_retried_on_same_encoding() {
        let (mut drive, mut link, robot) = rig();
        robot.set_fail_writes(true);
        assert_eq!(drive.on_key(Key::Up, true, &mut link), Transmission::Failed);
        assert_eq!(drive.last_sent(), None);

        robot.set_fail_writes(false);
        assert_eq!(drive.on_key(Key::Up, true, &mut link), Transmission::Sent);
        assert_eq!(robot.writes(), vec![vec![145, 0, 100, 0, 100]]);
    }

    #[test]
    fn reset_forgets_keys_and_last_packet() {
        let (mut drive, mut link, robot) = rig();
        drive.on_key(Key::Up, true, &mut link);
        drive.reset();
        assert_eq!(drive.key_state(), KeyState::default());
        assert_eq!(drive.last_sent(), None);

        // idle is resent after a reset since nothing is known to be on the wire
        assert_eq!(drive.on_key(Key::Up, false, &mut link), Transmission::Sent);
        assert_eq!(robot.writes().last(), Some(&IDLE.to_vec()));
    }

    #[test]
    fn steps_are_bounded_by_wheel_limit() {
        assert!(DriveSteps::new(500, 0).is_ok());
        assert!(DriveSteps::new(400, 200).is_ok());
        assert!(DriveSteps::new(400, 202).is_err());
        assert!(DriveSteps::new(-1, 100).is_err());
    }
}
