// console.rs - One operator session bound to one robot connection
use crate::codec;
use crate::dispatch::{Event, NamedCommand};
use crate::drive::{DriveState, DriveSteps, Key, Transmission};
use crate::link::SerialLink;

pub type BoxedLink = Box<dyn SerialLink + Send>;

/// Position of an event in one page session's stream. Sequence numbers only
/// ever grow within a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    pub session: String,
    pub seq: u64,
}

/// Owns the serial link and the drive state. Callers sharing a console
/// between threads must hold one lock for the whole of `handle`.
pub struct Console {
    link: Option<BoxedLink>,
    drive: DriveState,
    // newest stamp applied so far
    latest: Option<Stamp>,
}

impl Console {
    pub fn new(link: Option<BoxedLink>, steps: DriveSteps) -> Self {
        Self {
            link,
            drive: DriveState::new(steps),
            latest: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(|l| l.is_open())
    }

    pub fn drive(&self) -> &DriveState {
        &self.drive
    }

    pub fn handle(&mut self, event: &Event) {
        match event {
            Event::Key { key, pressed } => {
                self.on_key(*key, *pressed);
            }
            Event::Command(cmd) => self.send_command(*cmd),
            Event::Unknown(name) => log::debug!("Ignoring unknown command {:?}", name),
        }
    }

    /// Handles `event` unless a later event of the same session was already
    /// applied. A press that arrives after its own release is dropped, so the
    /// key is never left held. Returns whether the event was applied.
    pub fn handle_stamped(&mut self, stamp: Option<Stamp>, event: &Event) -> bool {
        if let Some(stamp) = stamp {
            if let Some(latest) = &self.latest {
                if latest.session == stamp.session && stamp.seq <= latest.seq {
                    log::debug!("Dropping {:?} #{}, already at #{}", event, stamp.seq, latest.seq);
                    return false;
                }
            }
            self.latest = Some(stamp);
        }
        self.handle(event);
        true
    }

    pub fn on_key(&mut self, key: Key, pressed: bool) -> Transmission {
        match self.link.as_deref_mut() {
            Some(link) => self.drive.on_key(key, pressed, link),
            None => {
                // keep tracking keys so the state is right once a link appears
                let mut offline = Offline;
                self.drive.on_key(key, pressed, &mut offline)
            }
        }
    }

    pub fn send_command(&mut self, cmd: NamedCommand) {
        match cmd.bytes() {
            Ok(bytes) => {
                log::debug!("{} -> {:?}", cmd.name(), bytes);
                self.send_raw(&bytes);
            }
            Err(e) => log::error!("{} has a bad literal: {}", cmd.name(), e),
        }
    }

    /// Parses and sends a decimal byte literal such as `"128 131"`.
    pub fn send_ascii(&mut self, literal: &str) -> bool {
        match codec::encode_ascii_command(literal) {
            Ok(bytes) => self.send_raw(&bytes),
            Err(e) => {
                log::warn!("{}", e);
                false
            }
        }
    }

    /// Write failures are logged, never raised.
    pub fn send_raw(&mut self, bytes: &[u8]) -> bool {
        let Some(link) = self.link.as_mut() else {
            log::warn!("Not connected.");
            return false;
        };
        match link.write(bytes) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Lost connection: {}", e);
                false
            }
        }
    }

    /// Swaps in a fresh link. Drive state starts over so a key that was held
    /// on the old link cannot resume motion on the new one.
    pub fn reconnect(&mut self, link: BoxedLink) {
        if let Some(mut old) = self.link.replace(link) {
            old.close();
        }
        self.drive.reset();
        log::info!("Link replaced, drive state reset");
    }

    pub fn disconnect(&mut self) {
        if let Some(mut old) = self.link.take() {
            old.close();
        }
        self.drive.reset();
    }

    fn read_decoded<T>(
        &mut self,
        n: usize,
        decode: fn(&[u8]) -> Result<T, codec::CodecError>,
    ) -> Option<T> {
        let link = self.link.as_mut()?;
        let bytes = link
            .read(n)
            .map_err(|e| log::warn!("Lost connection: {}", e))
            .ok()?;
        decode(&bytes)
            .map_err(|e| log::warn!("Got unexpected data from serial port: {}", e))
            .ok()
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        self.read_decoded(1, codec::decode_u8)
    }

    pub fn read_i8(&mut self) -> Option<i8> {
        self.read_decoded(1, codec::decode_i8)
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        self.read_decoded(2, codec::decode_u16_be)
    }

    pub fn read_i16(&mut self) -> Option<i16> {
        self.read_decoded(2, codec::decode_i16_be)
    }
}

// Stand-in while no port is attached: every write fails.
struct Offline;

impl SerialLink for Offline {
    fn write(&mut self, _bytes: &[u8]) -> Result<(), crate::link::LinkError> {
        Err(crate::link::LinkError::NotOpen)
    }

    fn read(&mut self, _n: usize) -> Result<Vec<u8>, crate::link::LinkError> {
        Err(crate::link::LinkError::NotOpen)
    }

    fn is_open(&self) -> bool {
        false
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::KeyState;
    use crate::link::MemoryLink;

    fn console() -> (Console, MemoryLink) {
        let robot = MemoryLink::new();
        let console = Console::new(Some(Box::new(robot.clone())), DriveSteps::default());
        (console, robot)
    }

    #[test]
    fn routes_keys_and_commands() {
        let (mut console, robot) = console();
        console.handle(&Event::parse("P"));
        console.handle(&Event::parse("UP"));
        console.handle(&Event::parse("UP_RELEASE"));
        console.handle(&Event::parse("DOCK"));
        assert_eq!(
            robot.writes(),
            vec![
                vec![128],
                vec![145, 0, 100, 0, 100],
                vec![145, 0, 0, 0, 0],
                vec![143],
            ]
        );
    }

    fn stamp(session: &str, seq: u64) -> Option<Stamp> {
        Some(Stamp {
            session: session.into(),
            seq,
        })
    }

    #[test]
    fn late_press_after_its_release_is_dropped() {
        let (mut console, robot) = console();
        assert!(console.handle_stamped(stamp("a", 2), &Event::parse("UP_RELEASE")));
        assert!(!console.handle_stamped(stamp("a", 1), &Event::parse("UP")));
        assert!(!console.drive().key_state().up);
        assert_eq!(robot.writes(), vec![vec![145, 0, 0, 0, 0]]);
    }

    #[test]
    fn repeated_sequence_number_is_dropped() {
        let (mut console, robot) = console();
        assert!(console.handle_stamped(stamp("a", 1), &Event::parse("DOCK")));
        assert!(!console.handle_stamped(stamp("a", 1), &Event::parse("DOCK")));
        assert_eq!(robot.writes(), vec![vec![143]]);
    }

    #[test]
    fn new_session_starts_its_own_sequence() {
        let (mut console, _) = console();
        assert!(console.handle_stamped(stamp("a", 40), &Event::parse("UP")));
        // page reloaded: numbering restarts
        assert!(console.handle_stamped(stamp("b", 1), &Event::parse("UP_RELEASE")));
        assert!(!console.drive().key_state().up);
        // unstamped events are always applied
        assert!(console.handle_stamped(None, &Event::parse("UP")));
        assert!(console.drive().key_state().up);
    }

    #[test]
    fn unknown_commands_write_nothing() {
        let (mut console, robot) = console();
        console.handle(&Event::parse("TELEPORT"));
        assert!(robot.writes().is_empty());
    }

    #[test]
    fn reconnect_resets_held_keys() {
        let (mut console, old) = console();
        console.handle(&Event::parse("UP"));
        console.handle(&Event::parse("LEFT"));

        let fresh = MemoryLink::new();
        console.reconnect(Box::new(fresh.clone()));
        assert!(!old.is_open());
        assert_eq!(console.drive().key_state(), KeyState::default());
        assert_eq!(console.drive().last_sent(), None);

        // a lone release on the new link only ever produces idle
        console.handle(&Event::parse("UP_RELEASE"));
        assert_eq!(fresh.writes(), vec![vec![145, 0, 0, 0, 0]]);
    }

    #[test]
    fn offline_console_swallows_writes() {
        let mut console = Console::new(None, DriveSteps::default());
        assert!(!console.is_connected());
        assert_eq!(console.on_key(Key::Up, true), Transmission::Failed);
        assert!(!console.send_raw(&[128]));
        assert!(console.drive().key_state().up);
        assert_eq!(console.read_u8(), None);
    }

    #[test]
    fn send_ascii_rejects_bad_literals() {
        let (mut console, robot) = console();
        assert!(console.send_ascii("128 131"));
        assert!(!console.send_ascii("128 999"));
        assert_eq!(robot.writes(), vec![vec![128, 131]]);
    }

    #[test]
    fn telemetry_reads_decode_big_endian() {
        let (mut console, robot) = console();
        robot.queue_incoming(&[0x02, 0xFE, 0x01, 0xF4, 0xFF, 0x9C]);
        assert_eq!(console.read_u8(), Some(2));
        assert_eq!(console.read_i8(), Some(-2));
        assert_eq!(console.read_u16(), Some(500));
        assert_eq!(console.read_i16(), Some(-100));
        assert_eq!(console.read_i16(), None);
    }

    #[test]
    fn failed_write_does_not_panic_or_commit() {
        let (mut console, robot) = console();
        robot.set_fail_writes(true);
        console.handle(&Event::parse("UP"));
        console.handle(&Event::parse("CLEAN"));
        assert_eq!(console.drive().last_sent(), None);
        robot.set_fail_writes(false);
        console.handle(&Event::parse("UP"));
        assert_eq!(robot.writes(), vec![vec![145, 0, 100, 0, 100]]);
    }
}
