//! Issuer file storage.

use bytes::Bytes;
use tapcard_apdu::{CommandApdu, Instruction, ResponseApdu, Tlv, TlvTag};

use crate::{
    command::CardCommand,
    environment::SessionEnvironment,
    error::{ProtocolError, Result},
    types::{Card, SettingsFlag},
};

fn check_files_allowed(card: &Card) -> Result<()> {
    if !card.settings.mask.contains(SettingsFlag::AllowFiles) {
        return Err(ProtocolError::InvalidState);
    }
    Ok(())
}

/// Read one issuer file off the card.
#[derive(Debug, Clone, Copy)]
pub struct ReadFileCommand {
    file_index: u8,
}

impl ReadFileCommand {
    /// Read the file in slot `file_index`.
    pub const fn new(file_index: u8) -> Self {
        Self { file_index }
    }
}

impl CardCommand for ReadFileCommand {
    type Output = Bytes;

    fn instruction(&self) -> Instruction {
        Instruction::ReadFileData
    }

    fn precheck(&self, card: &Card) -> Result<()> {
        check_files_allowed(card)
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        Ok(CommandApdu::with_tlvs(
            Instruction::ReadFileData,
            &[
                Tlv::new(TlvTag::Pin, environment.access_code.hash().to_vec()),
                Tlv::new(TlvTag::FileIndex, vec![self.file_index]),
            ],
        )?)
    }

    fn deserialize(
        &self,
        _environment: &mut SessionEnvironment,
        response: &ResponseApdu,
    ) -> Result<Bytes> {
        Ok(response.tlvs()?.required_bytes(TlvTag::IssuerData)?)
    }
}

/// Write one issuer file onto the card.
///
/// Files can run to kilobytes, so this is the command that exercises
/// extended-length frames.
#[derive(Debug, Clone)]
pub struct WriteFileCommand {
    file_index: u8,
    data: Bytes,
}

impl WriteFileCommand {
    /// Write `data` into slot `file_index`.
    pub fn new(file_index: u8, data: impl Into<Bytes>) -> Self {
        Self {
            file_index,
            data: data.into(),
        }
    }
}

impl CardCommand for WriteFileCommand {
    type Output = ();

    fn instruction(&self) -> Instruction {
        Instruction::WriteFileData
    }

    fn requires_passcode(&self) -> bool {
        true
    }

    fn precheck(&self, card: &Card) -> Result<()> {
        check_files_allowed(card)
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        Ok(CommandApdu::with_tlvs(
            Instruction::WriteFileData,
            &[
                Tlv::new(TlvTag::Pin, environment.access_code.hash().to_vec()),
                Tlv::new(TlvTag::Pin2, environment.passcode.hash().to_vec()),
                Tlv::new(TlvTag::FileIndex, vec![self.file_index]),
                Tlv::new(TlvTag::IssuerData, self.data.clone()),
            ],
        )?)
    }

    fn deserialize(
        &self,
        _environment: &mut SessionEnvironment,
        _response: &ResponseApdu,
    ) -> Result<()> {
        Ok(())
    }

    fn map_error(&self, _card: Option<&Card>, error: ProtocolError) -> ProtocolError {
        match error {
            ProtocolError::InvalidParams => ProtocolError::WrongPasscode,
            other => other,
        }
    }
}
