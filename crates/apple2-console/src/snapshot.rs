//! Memory snapshots saved as JSON.
//!
//! A snapshot holds the 48K below the I/O space from main memory (and aux
//! on a IIe), the soft switches and the registers at capture time. The
//! debugger cannot load registers, so restoring brings back memory and
//! switches only; the CPU carries on from wherever it was halted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use apple2_memory::{Bank, SoftSwitches};

use crate::console::Launcher;
use crate::error::{Error, Result};
use crate::machine::Apple2;
use crate::session::{Registers, SessionState};

pub const SNAPSHOT_VERSION: u32 = 1;
/// Bytes captured per bank: `$0000-$BFFF`.
pub const RAM_LEN: usize = 0xC000;

mod b64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

mod b64_opt {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => s.serialize_str(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub name: String,
    pub machine: String,
    pub registers: Registers,
    #[serde(with = "b64")]
    pub main: Vec<u8>,
    #[serde(with = "b64_opt", default)]
    pub aux: Option<Vec<u8>>,
    pub switches: SoftSwitches,
}

/// `<dir>/<name>.json`, refusing names that would escape `dir`.
pub fn snapshot_path(dir: &Path, name: &str) -> Result<PathBuf> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', ':'])
        || name.chars().any(char::is_control);
    if bad {
        return Err(Error::Snapshot(format!("invalid snapshot name: {name:?}")));
    }
    Ok(dir.join(format!("{name}.json")))
}

impl Snapshot {
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let path = snapshot_path(dir, &self.name)?;
        fs::create_dir_all(dir)?;
        fs::write(&path, serde_json::to_vec_pretty(self)?)?;
        log::info!("saved snapshot {} to {}", self.name, path.display());
        Ok(path)
    }

    pub fn load(dir: &Path, name: &str) -> Result<Self> {
        let path = snapshot_path(dir, name)?;
        let snapshot: Snapshot = serde_json::from_slice(&fs::read(&path)?)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    fn validate(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(Error::Snapshot(format!(
                "unsupported snapshot version {}",
                self.version
            )));
        }
        let sizes_ok = self.main.len() == RAM_LEN && self.aux.as_ref().is_none_or(|a| a.len() == RAM_LEN);
        if !sizes_ok {
            return Err(Error::Snapshot(format!(
                "snapshot {} has {} main bytes and {} aux bytes, expected {RAM_LEN}",
                self.name,
                self.main.len(),
                self.aux.as_ref().map_or(0, Vec::len)
            )));
        }
        Ok(())
    }
}

impl<L: Launcher> Apple2<L> {
    /// Capture memory, switches and registers.
    pub fn take_snapshot(&mut self, name: &str) -> Result<Snapshot> {
        snapshot_path(self.snapshot_dir(), name)?;
        self.require_live("snapshot")?;
        let has_aux = self.machine().has_aux();
        let machine = self.machine().to_string();
        self.in_debugger(|m| {
            let registers = m.session.registers()?;
            let switches = m.soft_switches()?;
            let main = m.read_bank(Bank::Main, 0, RAM_LEN)?;
            let aux = if has_aux {
                Some(m.read_bank(Bank::Aux, 0, RAM_LEN)?)
            } else {
                None
            };
            Ok(Snapshot {
                version: SNAPSHOT_VERSION,
                name: name.to_string(),
                machine,
                registers,
                main,
                aux,
                switches,
            })
        })
    }

    pub fn save_snapshot(&mut self, name: &str) -> Result<PathBuf> {
        let snapshot = self.take_snapshot(name)?;
        snapshot.save(self.snapshot_dir())
    }

    /// Load `<dir>/<name>.json` into the machine, rebooting first if the
    /// session is down.
    pub fn restore_snapshot(&mut self, name: &str) -> Result<Snapshot> {
        let snapshot = Snapshot::load(self.snapshot_dir(), name)?;
        self.restore(&snapshot)?;
        Ok(snapshot)
    }

    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<()> {
        snapshot.validate()?;
        if matches!(self.state(), SessionState::Crashed | SessionState::Uninitialized) {
            log::info!("booting to restore snapshot {}", snapshot.name);
            self.boot()?;
        }
        if snapshot.machine != self.machine().to_string() {
            log::warn!(
                "snapshot {} was taken on a {}, restoring onto a {}",
                snapshot.name,
                snapshot.machine,
                self.machine()
            );
        }
        let has_aux = self.machine().has_aux();
        self.in_debugger(|m| {
            m.write_bank(Bank::Main, 0, &snapshot.main)?;
            match (&snapshot.aux, has_aux) {
                (Some(aux), true) => m.write_bank(Bank::Aux, 0, aux)?,
                (Some(_), false) => log::warn!("dropping aux memory: machine has none"),
                (None, _) => {}
            }
            m.apply_switches(&snapshot.switches)
        })?;
        log::info!("restored snapshot {}", snapshot.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        let mut main = vec![0u8; RAM_LEN];
        main[0x0801] = 0x0B;
        Snapshot {
            version: SNAPSHOT_VERSION,
            name: "demo".to_string(),
            machine: "enhanced".to_string(),
            registers: Registers::default(),
            main,
            aux: None,
            switches: SoftSwitches::default(),
        }
    }

    #[test]
    fn json_carries_base64_memory() {
        let json = serde_json::to_value(sample()).expect("serialize");
        assert!(json["main"].is_string());
        assert!(json["aux"].is_null());
        let back: Snapshot = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back.main[0x0801], 0x0B);
        assert!(back.validate().is_ok());
    }

    #[test]
    fn names_stay_inside_the_directory() {
        let dir = Path::new("snaps");
        assert_eq!(snapshot_path(dir, "boot").expect("valid"), dir.join("boot.json"));
        for bad in ["", "../x", "a/b", "..", ".hidden", "c:d"] {
            assert!(matches!(snapshot_path(dir, bad), Err(Error::Snapshot(_))), "{bad}");
        }
    }

    #[test]
    fn wrong_size_is_rejected() {
        let mut snapshot = sample();
        snapshot.main.truncate(100);
        assert!(matches!(snapshot.validate(), Err(Error::Snapshot(_))));
    }
}
