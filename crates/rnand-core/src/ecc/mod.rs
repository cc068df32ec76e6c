//! ECC codecs
//!
//! The engine only *detects* page corruption: before every program it
//! computes a checksum over the page data and embeds it in the OOB area,
//! and after every full-page read it checks the data against the stored
//! bytes. Correction is left to the caller.
//!
//! The codec is a capability selected when the chip is constructed
//! ([`EccMode`]); with no codec the engine neither embeds nor verifies ECC
//! and every data read reports [`crate::PageStatus::Ok`].

mod hamming;

pub use hamming::Hamming256;

/// A page-payload checksum codec
pub trait EccCodec {
    /// Short name of the codec, used in logs
    fn name(&self) -> &'static str;

    /// Number of ECC bytes produced for `data_len` bytes of payload
    ///
    /// Returns `None` if the codec cannot protect a payload of that size.
    fn ecc_len(&self, data_len: usize) -> Option<usize>;

    /// Compute the ECC for `data` into `ecc`
    ///
    /// `ecc` is exactly `ecc_len(data.len())` bytes long.
    fn compute(&self, data: &[u8], ecc: &mut [u8]);

    /// Check `data` against previously computed `ecc`
    fn verify(&self, data: &[u8], ecc: &[u8]) -> bool;
}

/// ECC codec selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "std", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "std", serde(rename_all = "lowercase"))]
pub enum EccMode {
    /// No ECC: nothing is embedded on program, nothing verified on read
    None,
    /// 3 bytes of Hamming parity per 256 bytes of data
    #[default]
    Hamming256,
}

impl EccMode {
    /// Instantiate the selected codec
    #[cfg(feature = "alloc")]
    pub fn codec(self) -> Option<alloc::boxed::Box<dyn EccCodec + Send>> {
        match self {
            Self::None => None,
            Self::Hamming256 => Some(alloc::boxed::Box::new(Hamming256)),
        }
    }

    /// Number of OOB bytes the selected codec needs for a page
    ///
    /// Returns `Some(0)` for [`EccMode::None`] and `None` if the codec
    /// cannot protect a page of that size.
    pub fn ecc_len(self, page_size: usize) -> Option<usize> {
        match self {
            Self::None => Some(0),
            Self::Hamming256 => Hamming256.ecc_len(page_size),
        }
    }
}

impl core::fmt::Display for EccMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Hamming256 => write!(f, "hamming256"),
        }
    }
}
