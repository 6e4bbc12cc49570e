//! User code changes.

use std::fmt;

use tapcard_apdu::{CommandApdu, Instruction, ResponseApdu, Tlv, TlvTag};

use crate::{
    command::CardCommand,
    crypto::hash_user_code,
    environment::{SessionEnvironment, UserCode, UserCodeType},
    error::{ProtocolError, Result},
    types::{Card, SettingsFlag},
};

/// Replace the access code, the passcode, or both in one exchange.
#[derive(Clone)]
pub struct SetUserCodeCommand {
    new_access_hash: Option<[u8; 32]>,
    new_passcode_hash: Option<[u8; 32]>,
}

impl fmt::Debug for SetUserCodeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetUserCodeCommand")
            .field("changes_access_code", &self.new_access_hash.is_some())
            .field("changes_passcode", &self.new_passcode_hash.is_some())
            .finish()
    }
}

impl SetUserCodeCommand {
    /// Replace the access code.
    pub fn access_code(code: &str) -> Self {
        Self {
            new_access_hash: Some(hash_user_code(code)),
            new_passcode_hash: None,
        }
    }

    /// Replace the passcode.
    pub fn passcode(code: &str) -> Self {
        Self {
            new_access_hash: None,
            new_passcode_hash: Some(hash_user_code(code)),
        }
    }

    /// Replace both codes.
    pub fn both(access_code: &str, passcode: &str) -> Self {
        Self {
            new_access_hash: Some(hash_user_code(access_code)),
            new_passcode_hash: Some(hash_user_code(passcode)),
        }
    }
}

impl CardCommand for SetUserCodeCommand {
    type Output = ();

    fn instruction(&self) -> Instruction {
        Instruction::SetUserCode
    }

    fn requires_passcode(&self) -> bool {
        true
    }

    fn precheck(&self, card: &Card) -> Result<()> {
        if self.new_access_hash.is_none() && self.new_passcode_hash.is_none() {
            return Err(ProtocolError::SerializeFailed("no code to change".to_owned()));
        }
        if self.new_access_hash.is_some()
            && !card.settings.mask.contains(SettingsFlag::AllowSetAccessCode)
        {
            return Err(ProtocolError::AccessCodeCannotBeChanged);
        }
        if self.new_passcode_hash.is_some()
            && !card.settings.mask.contains(SettingsFlag::AllowSetPasscode)
        {
            return Err(ProtocolError::PasscodeCannotBeChanged);
        }
        Ok(())
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        let mut tlvs = vec![
            Tlv::new(TlvTag::Pin, environment.access_code.hash().to_vec()),
            Tlv::new(TlvTag::Pin2, environment.passcode.hash().to_vec()),
        ];
        if let Some(hash) = self.new_access_hash {
            tlvs.push(Tlv::new(TlvTag::NewPin, hash.to_vec()));
        }
        if let Some(hash) = self.new_passcode_hash {
            tlvs.push(Tlv::new(TlvTag::NewPin2, hash.to_vec()));
        }
        Ok(CommandApdu::with_tlvs(Instruction::SetUserCode, &tlvs)?)
    }

    fn deserialize(
        &self,
        environment: &mut SessionEnvironment,
        _response: &ResponseApdu,
    ) -> Result<()> {
        // The replacement codes are now live on the card. Install them so
        // later commands and the success-path persistence use them.
        if let Some(hash) = self.new_access_hash {
            environment.set_code(UserCode::entered_hash(UserCodeType::AccessCode, hash));
            if let Some(card) = environment.card.as_mut() {
                card.is_access_code_set = true;
            }
        }
        if let Some(hash) = self.new_passcode_hash {
            environment.set_code(UserCode::entered_hash(UserCodeType::Passcode, hash));
            if let Some(card) = environment.card.as_mut() {
                card.is_passcode_set = Some(true);
            }
        }
        Ok(())
    }

    fn map_error(&self, _card: Option<&Card>, error: ProtocolError) -> ProtocolError {
        match error {
            ProtocolError::InvalidParams => ProtocolError::WrongPasscode,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use tapcard_apdu::{StatusWord, TlvMap};

    use super::*;
    use crate::{
        environment::CodeOrigin,
        secure_channel::EncryptionMode,
        types::{CardSettingsMask, test_card},
    };

    #[test]
    fn test_serialize_carries_only_the_requested_change() {
        let environment = SessionEnvironment::new(EncryptionMode::None);
        let apdu = SetUserCodeCommand::passcode("123456")
            .serialize(&environment)
            .unwrap();

        let map = TlvMap::parse(&apdu.payload).unwrap();
        assert!(map.get(TlvTag::NewPin).is_none());
        assert_eq!(
            map.required(TlvTag::NewPin2).unwrap(),
            hash_user_code("123456").as_slice()
        );
    }

    #[test]
    fn test_precheck_honors_the_settings_mask() {
        let mut card = test_card();
        card.settings.mask = CardSettingsMask::from(SettingsFlag::AllowSetPasscode as u32);

        assert_eq!(
            SetUserCodeCommand::access_code("s3cret").precheck(&card),
            Err(ProtocolError::AccessCodeCannotBeChanged)
        );
        assert!(SetUserCodeCommand::passcode("s3cret").precheck(&card).is_ok());

        card.settings.mask = CardSettingsMask::from(0);
        assert_eq!(
            SetUserCodeCommand::passcode("s3cret").precheck(&card),
            Err(ProtocolError::PasscodeCannotBeChanged)
        );
    }

    #[test]
    fn test_deserialize_installs_the_new_codes() {
        let mut environment = SessionEnvironment::new(EncryptionMode::None);
        environment.card = Some(test_card());
        let response = ResponseApdu::new(Vec::new(), StatusWord::Pins12Changed);

        SetUserCodeCommand::both("meadow", "454545")
            .deserialize(&mut environment, &response)
            .unwrap();

        assert_eq!(environment.access_code.hash(), &hash_user_code("meadow"));
        assert_eq!(environment.access_code.origin(), CodeOrigin::Entered);
        assert_eq!(environment.passcode.hash(), &hash_user_code("454545"));
        assert_eq!(
            environment.card.as_ref().unwrap().is_passcode_set,
            Some(true)
        );
    }
}
