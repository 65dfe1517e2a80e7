//! Operational control field contents.
//!
//! TM and AOS frames can carry a 4-byte operational control field in their
//! trailer. A type-1 report is a Communications Link Control Word (CLCW,
//! CCSDS 232.1-B) carrying COP-1 status on the return link; type-2 reports
//! are project-specific and passed through untouched.

use crate::frame::Vcid;
use crate::{bits, Error, Result};

/// A decoded operational control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Ocf {
    Clcw(Clcw),
    /// Type-2 (project-specific) report, left uninterpreted.
    Reserved([u8; 4]),
}

impl Ocf {
    /// Decode an operational control field from the first 4 bytes of `dat`.
    ///
    /// # Errors
    ///
    /// [`Error::NotEnoughData`] when fewer than 4 bytes are available, or
    /// any error from [`Clcw::decode`] for a type-1 report.
    pub fn decode(dat: &[u8]) -> Result<Self> {
        if dat.len() < Clcw::LEN {
            return Err(Error::NotEnoughData {
                actual: dat.len(),
                minimum: Clcw::LEN,
            });
        }
        if dat[0] & 0x80 != 0 {
            return Ok(Ocf::Reserved([dat[0], dat[1], dat[2], dat[3]]));
        }
        Clcw::decode(dat).map(Ocf::Clcw)
    }
}

/// Communications Link Control Word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Clcw {
    /// CLCW version number, always 0.
    pub version: u8,
    /// Mission-specific status field, 3 bits.
    pub status: u8,
    /// COP in effect; 1 means COP-1.
    pub cop_in_effect: u8,
    /// Virtual channel this report covers.
    pub vcid: Vcid,
    pub no_rf_avail: bool,
    pub no_bit_lock: bool,
    pub lockout: bool,
    pub wait: bool,
    pub retransmit: bool,
    /// FARM-B counter, 2 bits.
    pub farm_b_counter: u8,
    /// Next expected frame sequence number V(R).
    pub report_value: u8,
}

impl Clcw {
    pub const LEN: usize = 4;

    /// Decode a CLCW from the first 4 bytes of `dat`.
    ///
    /// # Errors
    ///
    /// [`Error::NotEnoughData`] when fewer than 4 bytes are available;
    /// [`Error::FieldConstraint`] when the control word type bit or version
    /// is not zero.
    pub fn decode(dat: &[u8]) -> Result<Self> {
        if dat.len() < Self::LEN {
            return Err(Error::NotEnoughData {
                actual: dat.len(),
                minimum: Self::LEN,
            });
        }
        if bits::read(dat, 0, 1) != 0 {
            return Err(Error::FieldConstraint(
                "control word type must be 0 for a CLCW".into(),
            ));
        }
        let version = bits::read(dat, 1, 2) as u8;
        if version != 0 {
            return Err(Error::FieldConstraint(format!(
                "CLCW version must be 0, got {version}"
            )));
        }
        Ok(Self {
            version,
            status: bits::read(dat, 3, 3) as u8,
            cop_in_effect: bits::read(dat, 6, 2) as u8,
            vcid: bits::read(dat, 8, 6) as Vcid,
            no_rf_avail: bits::read(dat, 16, 1) == 1,
            no_bit_lock: bits::read(dat, 17, 1) == 1,
            lockout: bits::read(dat, 18, 1) == 1,
            wait: bits::read(dat, 19, 1) == 1,
            retransmit: bits::read(dat, 20, 1) == 1,
            farm_b_counter: bits::read(dat, 21, 2) as u8,
            report_value: dat[3],
        })
    }

    /// Encode to the 4-byte wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; 4] {
        let mut dat = [0u8; 4];
        bits::write(&mut dat, 1, 2, u32::from(self.version));
        bits::write(&mut dat, 3, 3, u32::from(self.status));
        bits::write(&mut dat, 6, 2, u32::from(self.cop_in_effect));
        bits::write(&mut dat, 8, 6, u32::from(self.vcid));
        bits::write(&mut dat, 16, 1, u32::from(self.no_rf_avail));
        bits::write(&mut dat, 17, 1, u32::from(self.no_bit_lock));
        bits::write(&mut dat, 18, 1, u32::from(self.lockout));
        bits::write(&mut dat, 19, 1, u32::from(self.wait));
        bits::write(&mut dat, 20, 1, u32::from(self.retransmit));
        bits::write(&mut dat, 21, 2, u32::from(self.farm_b_counter));
        dat[3] = self.report_value;
        dat
    }
}

/// Builds CLCWs with range-checked fields.
#[derive(Debug)]
pub struct ClcwBuilder {
    status: u8,
    cop_in_effect: u8,
    vcid: Vcid,
    no_rf_avail: bool,
    no_bit_lock: bool,
    lockout: bool,
    wait: bool,
    retransmit: bool,
    farm_b_counter: u8,
    report_value: u8,
}

impl Default for ClcwBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClcwBuilder {
    /// Create a builder with every field zeroed; a COP in effect is
    /// reported only after [`ClcwBuilder::set_cop_in_effect`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: 0,
            cop_in_effect: 0,
            vcid: 0,
            no_rf_avail: false,
            no_bit_lock: false,
            lockout: false,
            wait: false,
            retransmit: false,
            farm_b_counter: 0,
            report_value: 0,
        }
    }

    pub fn set_status(&mut self, status: u8) -> Result<()> {
        if status > 0x7 {
            return Err(Error::FieldConstraint(format!(
                "CLCW status is 3 bits, got {status:#x}"
            )));
        }
        self.status = status;
        Ok(())
    }

    pub fn set_cop_in_effect(&mut self, cop: u8) -> Result<()> {
        if cop > 0x3 {
            return Err(Error::FieldConstraint(format!(
                "COP in effect is 2 bits, got {cop:#x}"
            )));
        }
        self.cop_in_effect = cop;
        Ok(())
    }

    pub fn set_vcid(&mut self, vcid: Vcid) -> Result<()> {
        if vcid > 0x3f {
            return Err(Error::FieldConstraint(format!(
                "CLCW virtual channel id is 6 bits, got {vcid:#x}"
            )));
        }
        self.vcid = vcid;
        Ok(())
    }

    pub fn set_no_rf_avail(&mut self, on: bool) {
        self.no_rf_avail = on;
    }

    pub fn set_no_bit_lock(&mut self, on: bool) {
        self.no_bit_lock = on;
    }

    pub fn set_lockout(&mut self, on: bool) {
        self.lockout = on;
    }

    pub fn set_wait(&mut self, on: bool) {
        self.wait = on;
    }

    pub fn set_retransmit(&mut self, on: bool) {
        self.retransmit = on;
    }

    pub fn set_farm_b_counter(&mut self, count: u8) -> Result<()> {
        if count > 0x3 {
            return Err(Error::FieldConstraint(format!(
                "FARM-B counter is 2 bits, got {count:#x}"
            )));
        }
        self.farm_b_counter = count;
        Ok(())
    }

    pub fn set_report_value(&mut self, value: u8) {
        self.report_value = value;
    }

    #[must_use]
    pub fn build(self) -> Clcw {
        Clcw {
            version: 0,
            status: self.status,
            cop_in_effect: self.cop_in_effect,
            vcid: self.vcid,
            no_rf_avail: self.no_rf_avail,
            no_bit_lock: self.no_bit_lock,
            lockout: self.lockout,
            wait: self.wait,
            retransmit: self.retransmit,
            farm_b_counter: self.farm_b_counter,
            report_value: self.report_value,
        }
    }
}
