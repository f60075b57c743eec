use std::collections::HashMap;

use avrfuse::{
    connection::{Programmer, ProgrammingSession},
    decode,
    error::ConnectionError,
    reader::{FuseReader, Register},
    DeviceDatabase, Error, FuseGroup, Signature,
};
use pretty_assertions::assert_eq;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Enter,
    Leave,
    Universal([u8; 4]),
}

/// Answers serial programming instructions from a fixed memory image
#[derive(Default)]
struct ScriptedProgrammer {
    memory: HashMap<[u8; 4], u8>,
    events: Vec<Event>,
    fail_enter: bool,
}

impl ScriptedProgrammer {
    fn target(signature: [u8; 3], registers: &[(FuseGroup, u8)]) -> Self {
        let mut memory = HashMap::new();

        for (index, byte) in (0u8..).zip(signature) {
            memory.insert(Signature::read_instruction(index), byte);
        }
        for (group, value) in registers {
            memory.insert(group.read_instruction(), *value);
        }

        Self {
            memory,
            ..Default::default()
        }
    }

    fn atmega328p() -> Self {
        Self::target(
            [0x1e, 0x95, 0x0f],
            &[
                (FuseGroup::Low, 0x62),
                (FuseGroup::High, 0xd9),
                (FuseGroup::Extended, 0xfd),
                (FuseGroup::Lock, 0xff),
            ],
        )
    }

    fn leaves(&self) -> usize {
        self.events.iter().filter(|e| **e == Event::Leave).count()
    }
}

impl Programmer for ScriptedProgrammer {
    fn enter_programming_mode(&mut self) -> Result<(), Error> {
        self.events.push(Event::Enter);

        if self.fail_enter {
            Err(ConnectionError::Failed(0x11).into())
        } else {
            Ok(())
        }
    }

    fn leave_programming_mode(&mut self) -> Result<(), Error> {
        self.events.push(Event::Leave);
        Ok(())
    }

    fn universal(&mut self, instruction: [u8; 4]) -> Result<u8, Error> {
        self.events.push(Event::Universal(instruction));

        self.memory
            .get(&instruction)
            .copied()
            .ok_or_else(|| ConnectionError::Timeout.into())
    }
}

#[test]
fn session_releases_target_on_drop() {
    let mut programmer = ScriptedProgrammer::atmega328p();

    {
        let mut session = ProgrammingSession::open(&mut programmer).unwrap();
        assert_eq!(session.read_group(FuseGroup::Low).unwrap(), 0x62);
    }

    assert_eq!(
        programmer.events,
        vec![
            Event::Enter,
            Event::Universal([0x50, 0x00, 0x00, 0x00]),
            Event::Leave,
        ]
    );
}

#[test]
fn session_releases_target_once_when_closed() {
    let mut programmer = ScriptedProgrammer::atmega328p();

    let session = ProgrammingSession::open(&mut programmer).unwrap();
    session.close().unwrap();

    assert_eq!(programmer.events, vec![Event::Enter, Event::Leave]);
}

#[test]
fn session_releases_target_after_failed_entry() {
    let mut programmer = ScriptedProgrammer {
        fail_enter: true,
        ..ScriptedProgrammer::atmega328p()
    };

    let error = ProgrammingSession::open(&mut programmer).err();
    assert!(matches!(
        error,
        Some(Error::Connection(ConnectionError::Failed(0x11)))
    ));
    assert_eq!(programmer.events, vec![Event::Enter, Event::Leave]);
}

#[test]
fn session_releases_target_after_failed_read() {
    // Nothing answers the lock bit read
    let mut programmer = ScriptedProgrammer::target([0x1e, 0x95, 0x0f], &[]);

    {
        let mut session = ProgrammingSession::open(&mut programmer).unwrap();
        assert!(matches!(
            session.read_group(FuseGroup::Lock),
            Err(Error::Connection(ConnectionError::Timeout))
        ));
    }

    assert_eq!(programmer.leaves(), 1);
}

#[test]
fn reads_signature_byte_by_byte() {
    let mut programmer = ScriptedProgrammer::atmega328p();

    let mut session = ProgrammingSession::open(&mut programmer).unwrap();
    assert_eq!(session.read_signature().unwrap(), Signature([0x1e, 0x95, 0x0f]));
    drop(session);

    assert_eq!(
        &programmer.events[1..4],
        &[
            Event::Universal([0x30, 0x00, 0x00, 0x00]),
            Event::Universal([0x30, 0x00, 0x01, 0x00]),
            Event::Universal([0x30, 0x00, 0x02, 0x00]),
        ]
    );
}

#[test]
fn reads_and_decodes_factory_defaults() {
    let database = DeviceDatabase::builtin();
    let mut programmer = ScriptedProgrammer::atmega328p();

    let mut reader = FuseReader::connect(&mut programmer, &database, None).unwrap();
    assert_eq!(reader.device().name, "ATmega328P");

    let registers = reader.read_all().unwrap();
    let device = reader.device().clone();
    reader.close().unwrap();

    assert_eq!(
        registers,
        vec![
            Register {
                group: FuseGroup::Low,
                raw: 0x62
            },
            Register {
                group: FuseGroup::High,
                raw: 0xd9
            },
            Register {
                group: FuseGroup::Extended,
                raw: 0xfd
            },
            Register {
                group: FuseGroup::Lock,
                raw: 0xff
            },
        ]
    );
    assert_eq!(programmer.leaves(), 1);

    let low = decode(0x62, device.table(FuseGroup::Low)).unwrap();
    assert!(low.warnings().is_empty());
    assert_eq!(low.get("CKDIV8").unwrap().status, "Programmed");
    assert_eq!(low.get("CKOUT").unwrap().status, "Unprogrammed");

    let high = decode(0xd9, device.table(FuseGroup::High)).unwrap();
    assert!(high.warnings().is_empty());
    assert_eq!(high.get("SPIEN").unwrap().status, "Programmed");
}

#[test]
fn skips_registers_the_device_lacks() {
    let database = DeviceDatabase::builtin();
    let mut programmer = ScriptedProgrammer::target(
        [0x1e, 0x90, 0x07],
        &[
            (FuseGroup::Low, 0x6a),
            (FuseGroup::High, 0xff),
            (FuseGroup::Lock, 0xff),
        ],
    );

    let mut reader = FuseReader::connect(&mut programmer, &database, None).unwrap();
    assert_eq!(reader.device().name, "ATtiny13A");
    assert_eq!(reader.read(FuseGroup::Extended).unwrap(), None);

    let groups = reader
        .read_all()
        .unwrap()
        .into_iter()
        .map(|register| register.group)
        .collect::<Vec<_>>();
    drop(reader);

    assert_eq!(groups, vec![FuseGroup::Low, FuseGroup::High, FuseGroup::Lock]);
    assert!(!programmer
        .events
        .contains(&Event::Universal(FuseGroup::Extended.read_instruction())));
}

#[test]
fn unknown_signature_is_an_error() {
    let database = DeviceDatabase::builtin();
    let mut programmer = ScriptedProgrammer::target([0x1e, 0x12, 0x34], &[]);

    let error = FuseReader::connect(&mut programmer, &database, None).err();
    match error {
        Some(Error::UnknownSignature { signature, known }) => {
            assert_eq!(signature, Signature([0x1e, 0x12, 0x34]));
            assert!(known.contains("ATmega328P"));
        }
        _ => panic!("expected an unknown signature error"),
    }

    assert_eq!(programmer.leaves(), 1);
}

#[test]
fn blank_signature_means_no_target() {
    let database = DeviceDatabase::builtin();
    let mut programmer = ScriptedProgrammer::target([0xff, 0xff, 0xff], &[]);

    let result = FuseReader::connect(&mut programmer, &database, None);
    assert!(matches!(result, Err(Error::NoTarget(_))));
}

#[test]
fn named_device_overrides_signature() {
    let database = DeviceDatabase::builtin();
    let mut programmer = ScriptedProgrammer::target(
        [0x1e, 0x12, 0x34],
        &[(FuseGroup::Low, 0x62), (FuseGroup::Lock, 0xff)],
    );

    let mut reader = FuseReader::connect(&mut programmer, &database, Some("attiny85")).unwrap();
    assert_eq!(reader.device().name, "ATtiny85");
    assert_eq!(reader.signature(), Signature([0x1e, 0x12, 0x34]));

    let low = reader.read(FuseGroup::Low).unwrap();
    assert_eq!(
        low,
        Some(Register {
            group: FuseGroup::Low,
            raw: 0x62
        })
    );
}

#[test]
fn unknown_device_name_is_an_error() {
    let database = DeviceDatabase::builtin();
    let mut programmer = ScriptedProgrammer::atmega328p();

    let error = FuseReader::connect(&mut programmer, &database, Some("ATmega8")).err();
    assert!(matches!(error, Some(Error::UnknownDevice { .. })));
    assert_eq!(programmer.leaves(), 1);
}

#[test]
fn hands_over_each_register_before_a_failed_read() {
    let database = DeviceDatabase::builtin();
    // Nothing answers the lock bit read
    let mut programmer = ScriptedProgrammer::target(
        [0x1e, 0x95, 0x0f],
        &[
            (FuseGroup::Low, 0x62),
            (FuseGroup::High, 0xd9),
            (FuseGroup::Extended, 0xfd),
        ],
    );

    let mut seen = Vec::new();
    let mut reader = FuseReader::connect(&mut programmer, &database, None).unwrap();
    let result = reader.read_each(|device, register| {
        assert_eq!(device.name, "ATmega328P");
        seen.push(register.group);
        Ok::<_, Error>(())
    });
    drop(reader);

    assert!(matches!(
        result,
        Err(Error::Connection(ConnectionError::Timeout))
    ));
    assert_eq!(
        seen,
        vec![FuseGroup::Low, FuseGroup::High, FuseGroup::Extended]
    );
    assert_eq!(programmer.leaves(), 1);
}

#[test]
fn stops_when_the_callback_fails() {
    let database = DeviceDatabase::builtin();
    let mut programmer = ScriptedProgrammer::atmega328p();

    let mut reader = FuseReader::connect(&mut programmer, &database, None).unwrap();
    let result = reader.read_each(|_, register| match register.group {
        FuseGroup::High => Err(Error::Cancelled),
        _ => Ok(()),
    });
    drop(reader);

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(!programmer
        .events
        .contains(&Event::Universal(FuseGroup::Extended.read_instruction())));
}
