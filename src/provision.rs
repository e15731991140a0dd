//! Interactive provisioning over a line-oriented console
//!
//! Each field has a pure validator; [`ProvisioningDialog`] asks for the
//! fields in a fixed order and repeats a question until the answer
//! validates. With [`AttemptPolicy::Forever`] (the default, for a human at a
//! serial port) this blocks until someone answers.

use std::fmt;
use std::io::{self, BufRead, BufReader, Write};

use thiserror::Error;
use tracing::{debug, info};

use crate::band::{self, Band};
use crate::credentials::CredentialStore;
use crate::hex_codec;
use crate::store::DurableStore;

/// Fields asked for, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Band,
    SubBand,
    JoinEui,
    DevEui,
    AppKey,
    NwkKey,
}

impl Field {
    fn prompt(self) -> &'static str {
        match self {
            Field::Band => "Enter LoRaWAN band (e.g. EU868 or US915)",
            Field::SubBand => {
                "Enter subband for your frequency plan, if applicable. Otherwise just press Enter."
            }
            Field::JoinEui => {
                "Enter joinEUI (64 bits, 16 hex characters.) Press enter to use all zeroes."
            }
            Field::DevEui => "Enter devEUI (64 bits, 16 hex characters)",
            Field::AppKey => "Enter appKey (128 bits, 32 hex characters)",
            Field::NwkKey => "Enter nwkKey (128 bits, 32 hex characters)",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Band => "band",
            Field::SubBand => "subband",
            Field::JoinEui => "joinEUI",
            Field::DevEui => "devEUI",
            Field::AppKey => "appKey",
            Field::NwkKey => "nwkKey",
        };
        f.write_str(name)
    }
}

/// How many times a field is asked for before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttemptPolicy {
    #[default]
    Forever,
    Bounded(u32),
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("console closed while asking for {0}")]
    ConsoleClosed(Field),

    #[error("no valid {field} after {attempts} attempts")]
    TooManyAttempts { field: Field, attempts: u32 },

    #[error("console I/O error: {0}")]
    Io(#[from] io::Error),
}

const ZERO_EUI: &str = "0000000000000000";

/// Band name, upper-cased before lookup
pub fn parse_band(input: &str) -> Option<&'static Band> {
    band::resolve(&input.to_uppercase())
}

/// Sub-band: empty means 0 (not applicable), otherwise 1..=254
pub fn parse_sub_band(input: &str) -> Option<u8> {
    if input.is_empty() {
        return Some(0);
    }
    match input.parse::<u16>() {
        Ok(n) if n > 0 && n < 255 => Some(n as u8),
        _ => None,
    }
}

/// JoinEUI: empty means all zeroes, otherwise exactly 16 hex digits
pub fn parse_join_eui(input: &str) -> Option<u64> {
    let text = if input.is_empty() { ZERO_EUI } else { input };
    hex_codec::decode_u64(text).ok()
}

/// DevEUI: exactly 16 hex digits
pub fn parse_dev_eui(input: &str) -> Option<u64> {
    hex_codec::decode_u64(input).ok()
}

/// AppKey or NwkKey: exactly 32 hex digits
pub fn parse_key(input: &str) -> Option<[u8; 16]> {
    hex_codec::decode_fixed::<16>(input).ok()
}

/// A line-oriented console the dialog can run on
pub struct Console {
    input: Box<dyn BufRead>,
    output: Box<dyn Write>,
}

impl Console {
    pub fn new(input: impl BufRead + 'static, output: impl Write + 'static) -> Self {
        Self {
            input: Box::new(input),
            output: Box::new(output),
        }
    }

    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }

    pub fn dialog(&mut self, policy: AttemptPolicy) -> ProvisioningDialog<'_, dyn BufRead, dyn Write> {
        ProvisioningDialog::new(&mut *self.input, &mut *self.output, policy)
    }

    pub fn println(&mut self, msg: &str) -> io::Result<()> {
        writeln!(self.output, "{}", msg)?;
        self.output.flush()
    }
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}

pub struct ProvisioningDialog<'c, R: BufRead + ?Sized, W: Write + ?Sized> {
    input: &'c mut R,
    output: &'c mut W,
    policy: AttemptPolicy,
}

impl<'c, R: BufRead + ?Sized, W: Write + ?Sized> ProvisioningDialog<'c, R, W> {
    pub fn new(input: &'c mut R, output: &'c mut W, policy: AttemptPolicy) -> Self {
        Self {
            input,
            output,
            policy,
        }
    }

    /// Collect a full provisioning set and store it.
    ///
    /// Returns whether the store confirmed the data. Errors only when the
    /// console fails or closes, or a bounded policy runs out of attempts.
    pub fn run<S: DurableStore>(
        &mut self,
        creds: &mut CredentialStore<'_, S>,
    ) -> Result<bool, ProvisionError> {
        writeln!(
            self.output,
            "Please enter the provisioning information needed to join the LoRaWAN network.\n"
        )?;

        let band = self.ask(Field::Band, |s| {
            parse_band(s).map(|band| (band, band.name.to_string()))
        })?;
        let sub_band = self.ask(Field::SubBand, |s| {
            parse_sub_band(s).map(|n| (n, s.to_string()))
        })?;
        let join_eui = self.ask(Field::JoinEui, |s| {
            let shown = if s.is_empty() { ZERO_EUI } else { s };
            parse_join_eui(s).map(|eui| (eui, shown.to_string()))
        })?;
        let dev_eui = self.ask(Field::DevEui, |s| {
            parse_dev_eui(s).map(|eui| (eui, s.to_string()))
        })?;
        let app_key = self.ask(Field::AppKey, |s| parse_key(s).map(|k| (k, s.to_string())))?;
        let nwk_key = self.ask(Field::NwkKey, |s| parse_key(s).map(|k| (k, s.to_string())))?;

        let ok = creds.provision(band.name, sub_band, join_eui, dev_eui, &app_key, &nwk_key);
        if ok {
            info!("Provisioning information entered on console saved");
            writeln!(self.output, "Thank you. Provisioning information saved to flash.")?;
        } else {
            writeln!(
                self.output,
                "Error: provisioning information could not be saved to flash."
            )?;
        }
        self.output.flush()?;
        Ok(ok)
    }

    /// Ask for one field until `validate` accepts the answer.
    /// `validate` returns the value and the text to echo back.
    fn ask<T>(
        &mut self,
        field: Field,
        validate: impl Fn(&str) -> Option<(T, String)>,
    ) -> Result<T, ProvisionError> {
        let mut attempts = 0u32;
        loop {
            writeln!(self.output, "{}", field.prompt())?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(ProvisionError::ConsoleClosed(field));
            }
            let answer = line.trim_end_matches(['\n', '\r']);

            if let Some((value, shown)) = validate(answer) {
                writeln!(self.output, "[{}]", shown)?;
                debug!("Accepted {}", field);
                return Ok(value);
            }

            if field == Field::Band {
                writeln!(self.output, "\nError: '{}' is not a supported band.", answer)?;
            } else {
                writeln!(self.output, "\nError: '{}' is not a valid {}.", answer, field)?;
            }

            attempts += 1;
            if let AttemptPolicy::Bounded(max) = self.policy {
                if attempts >= max {
                    return Err(ProvisionError::TooManyAttempts { field, attempts });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialRecord;
    use crate::store::MemoryStore;
    use std::io::Cursor;

    const APP: &str = "00112233445566778899AABBCCDDEEFF";
    const NWK: &str = "FFEEDDCCBBAA99887766554433221100";

    fn run_dialog(
        script: &str,
        policy: AttemptPolicy,
    ) -> (Result<bool, ProvisionError>, String, CredentialRecord) {
        let mut store = MemoryStore::new();
        let mut record = CredentialRecord::default();
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut output = Vec::new();
        let result = ProvisioningDialog::new(&mut input, &mut output, policy)
            .run(&mut CredentialStore::new(&mut store, &mut record));
        (result, String::from_utf8(output).unwrap(), record)
    }

    #[test]
    fn test_parse_band_normalises_case() {
        assert_eq!(parse_band("eu868").map(|b| b.name), Some("EU868"));
        assert_eq!(parse_band("Us915").map(|b| b.name), Some("US915"));
        assert!(parse_band("nowhere").is_none());
        assert!(parse_band("").is_none());
    }

    #[test]
    fn test_parse_sub_band_range() {
        assert_eq!(parse_sub_band(""), Some(0));
        assert_eq!(parse_sub_band("1"), Some(1));
        assert_eq!(parse_sub_band("254"), Some(254));
        assert_eq!(parse_sub_band("0"), None);
        assert_eq!(parse_sub_band("255"), None);
        assert_eq!(parse_sub_band("-1"), None);
        assert_eq!(parse_sub_band("two"), None);
    }

    #[test]
    fn test_parse_euis() {
        assert_eq!(parse_join_eui(""), Some(0));
        assert_eq!(parse_join_eui("70B3D57ED0000000"), Some(0x70B3_D57E_D000_0000));
        assert_eq!(parse_dev_eui(""), None);
        assert_eq!(parse_dev_eui("0004A30B001C053"), None);
        assert_eq!(parse_dev_eui("0004a30b001c0530"), Some(0x0004_A30B_001C_0530));
    }

    #[test]
    fn test_parse_key() {
        assert!(parse_key(APP).is_some());
        assert!(parse_key(&APP[..31]).is_none());
        assert!(parse_key(&format!("{}0", APP)).is_none());
        assert!(parse_key("zz112233445566778899AABBCCDDEEFF").is_none());
    }

    #[test]
    fn test_dialog_happy_path() {
        let script = format!("us915\n2\n\n0004A30B001C0530\n{}\n{}\n", APP, NWK);
        let (result, output, record) = run_dialog(&script, AttemptPolicy::Forever);

        assert!(result.unwrap());
        assert_eq!(record.band, "US915");
        assert_eq!(record.sub_band, 2);
        assert_eq!(record.join_eui, Some(0));
        assert_eq!(record.dev_eui, Some(0x0004_A30B_001C_0530));
        assert_eq!(record.app_key, parse_key(APP));
        assert_eq!(record.nwk_key, parse_key(NWK));

        assert!(output.contains("[US915]\n"));
        assert!(output.contains("[2]\n"));
        assert!(output.contains("[0000000000000000]\n"));
        assert!(output.contains("[0004A30B001C0530]\n"));
        assert!(output.ends_with("Thank you. Provisioning information saved to flash.\n"));
    }

    #[test]
    fn test_dialog_reprompts_invalid_answers() {
        let script = format!(
            "mars\nEU868\n300\n\nnothex\n0000000000000001\n0004A30B001C0530\n{}\nshort\n{}\n",
            APP, NWK
        );
        let (result, output, record) = run_dialog(&script, AttemptPolicy::Forever);

        assert!(result.unwrap());
        assert_eq!(record.band, "EU868");
        assert_eq!(record.sub_band, 0);
        assert_eq!(record.join_eui, Some(1));
        assert!(output.contains("Error: 'mars' is not a supported band."));
        assert!(output.contains("Error: '300' is not a valid subband."));
        // An empty sub-band is echoed as typed
        assert!(output.contains("\n[]\n"));
        assert!(output.contains("Error: 'nothex' is not a valid joinEUI."));
        assert!(output.contains("Error: 'short' is not a valid nwkKey."));
        assert_eq!(output.matches(Field::Band.prompt()).count(), 2);
        assert_eq!(output.matches(Field::NwkKey.prompt()).count(), 2);
    }

    #[test]
    fn test_dialog_accepts_crlf_lines() {
        let script = format!("EU868\r\n\r\n\r\n0004A30B001C0530\r\n{}\r\n{}\r\n", APP, NWK);
        let (result, _, record) = run_dialog(&script, AttemptPolicy::Forever);
        assert!(result.unwrap());
        assert_eq!(record.dev_eui, Some(0x0004_A30B_001C_0530));
    }

    #[test]
    fn test_dialog_bounded_attempts() {
        let (result, _, _) = run_dialog("a\nb\nc\n", AttemptPolicy::Bounded(2));
        assert!(matches!(
            result,
            Err(ProvisionError::TooManyAttempts {
                field: Field::Band,
                attempts: 2
            })
        ));
    }

    #[test]
    fn test_dialog_console_closed() {
        let (result, _, record) = run_dialog("EU868\n\n", AttemptPolicy::Forever);
        assert!(matches!(
            result,
            Err(ProvisionError::ConsoleClosed(Field::JoinEui))
        ));
        assert_eq!(record, CredentialRecord::default());
    }

    #[test]
    fn test_dialog_reports_failed_save() {
        let mut store = MemoryStore::new();
        store.set_reject_writes(true);
        let mut record = CredentialRecord::default();
        let script = format!("EU868\n\n\n0004A30B001C0530\n{}\n{}\n", APP, NWK);
        let mut input = Cursor::new(script.into_bytes());
        let mut output = Vec::new();

        let result = ProvisioningDialog::new(&mut input, &mut output, AttemptPolicy::Forever)
            .run(&mut CredentialStore::new(&mut store, &mut record));

        assert!(!result.unwrap());
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("could not be saved"));
    }
}
