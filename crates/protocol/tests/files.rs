//! Issuer file storage, including extended length frames.

use std::sync::Arc;

use tapcard_apdu::Bytes;
use tapcard_harness::{RecordingDelegate, SimTransceiver, TokenSim};
use tapcard_protocol::{
    ProtocolError, ReadFileCommand, Session, SessionConfig, SessionRunnable, WriteFileCommand,
};

/// Writes one file slot and reads it straight back in the same tap.
struct FilePingPong {
    slot: u8,
    data: Bytes,
}

impl SessionRunnable for FilePingPong {
    type Output = Bytes;

    fn run(&self, session: &mut Session) -> Result<Bytes, ProtocolError> {
        WriteFileCommand::new(self.slot, self.data.clone()).run(session)?;
        ReadFileCommand::new(self.slot).run(session)
    }
}

#[test]
fn test_write_then_read_round_trips_through_the_card() {
    let delegate = Arc::new(RecordingDelegate::new());
    let (transceiver, tag) = SimTransceiver::new(TokenSim::new());
    let mut session = Session::new(transceiver, delegate, SessionConfig::new());

    // big enough that the write needs extended length frames
    let data = Bytes::from(vec![0xAB; 300]);
    let task = FilePingPong {
        slot: 1,
        data: data.clone(),
    };

    assert_eq!(session.run(&task).unwrap(), data);
    assert_eq!(tag.card().file(1).cloned(), Some(data));
}

#[test]
fn test_reading_an_empty_slot_reports_file_not_found() {
    let delegate = Arc::new(RecordingDelegate::new());
    let (transceiver, _tag) = SimTransceiver::new(TokenSim::new());
    let mut session = Session::new(transceiver, delegate, SessionConfig::new());

    let error = session.run(&ReadFileCommand::new(7)).unwrap_err();

    assert_eq!(error, ProtocolError::FileNotFound);
}

#[test]
fn test_files_disabled_in_settings_fail_before_the_wire() {
    let delegate = Arc::new(RecordingDelegate::new());
    let (transceiver, tag) =
        SimTransceiver::new(TokenSim::new().with_settings_bits(0x0000_0003));
    let mut session = Session::new(transceiver, delegate, SessionConfig::new());

    let error = session
        .run(&WriteFileCommand::new(0, Bytes::from_static(b"blob")))
        .unwrap_err();

    assert_eq!(error, ProtocolError::InvalidState);
    // the precheck stopped it client side
    assert!(
        !tag.card()
            .processed()
            .contains(&tapcard_apdu::Instruction::WriteFileData)
    );
}
