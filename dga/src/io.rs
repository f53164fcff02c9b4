// SPDX-License-Identifier: AGPL-3.0-only

//! JSON input and output of DMFT data, local two-particle data and results.
//!
//! Complex arrays are stored as `{ "re": [...], "im": [...] }`. Files:
//!   - one-particle DMFT input: β, U, filling, μ and full-range Σ(iν), G(iν)
//!   - local G2 per channel: bosonic indices and row-major `[ω][ν][ν']` data
//!   - results: any `Serialize` type through [`write_json`]

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use num_complex::Complex64;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{DgaError, Result};
use crate::four_point::Channel;

/// Complex array split into real and imaginary parts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexArray {
    /// Real parts.
    pub re: Vec<f64>,
    /// Imaginary parts.
    pub im: Vec<f64>,
}

impl ComplexArray {
    /// Split a complex slice.
    #[must_use]
    pub fn from_slice(values: &[Complex64]) -> Self {
        Self {
            re: values.iter().map(|z| z.re).collect(),
            im: values.iter().map(|z| z.im).collect(),
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.re.len()
    }

    /// Whether the array is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.re.is_empty()
    }

    /// Recombine into complex values.
    ///
    /// # Errors
    ///
    /// [`DgaError::Shape`] when the real and imaginary parts differ in length.
    pub fn to_vec(&self) -> Result<Vec<Complex64>> {
        crate::error::ensure_len("complex array (im vs re)", self.re.len(), self.im.len())?;
        Ok(self
            .re
            .iter()
            .zip(&self.im)
            .map(|(&re, &im)| Complex64::new(re, im))
            .collect())
    }
}

/// One-particle DMFT input.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DmftInput {
    /// Inverse temperature.
    pub beta: f64,
    /// Hubbard interaction.
    pub u: f64,
    /// Filling (both spins).
    pub n: f64,
    /// DMFT chemical potential.
    pub mu_dmft: f64,
    /// Full-range local self-energy Σ(iν_n), n ∈ [−N, N).
    pub siw: ComplexArray,
    /// Full-range local Green's function G(iν_n), n ∈ [−N, N).
    pub giw: ComplexArray,
}

impl DmftInput {
    /// Positive-frequency half of Σ.
    ///
    /// # Errors
    ///
    /// Propagates shape errors of the stored arrays.
    pub fn siw_positive(&self) -> Result<Vec<Complex64>> {
        let full = self.siw.to_vec()?;
        Ok(full[full.len() / 2..].to_vec())
    }
}

/// Local two-particle Green's function of one channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalG2File {
    /// Spin channel.
    pub channel: Channel,
    /// Inverse temperature.
    pub beta: f64,
    /// Bosonic indices of the stored slices.
    pub wn: Vec<i64>,
    /// Half-size of the fermionic box.
    pub niv: usize,
    /// Row-major `[ω][ν][ν']` values.
    pub data: ComplexArray,
}

/// Load any JSON document.
///
/// # Errors
///
/// [`DgaError::DataLoad`] with the path when opening or parsing fails.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .map_err(|e| DgaError::DataLoad(format!("{}: {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| DgaError::DataLoad(format!("{}: {e}", path.display())))
}

/// Write any serialisable value as pretty JSON.
///
/// # Errors
///
/// [`DgaError::DataLoad`] when the file cannot be created or written.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)
        .map_err(|e| DgaError::DataLoad(format!("{}: {e}", path.display())))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .map_err(|e| DgaError::DataLoad(format!("{}: {e}", path.display())))
}

/// Return `path` if it does not exist yet, otherwise the first free
/// `path_1`, `path_2`, ….
#[must_use]
pub fn uniquify_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let base = path.as_os_str().to_string_lossy().into_owned();
    let mut counter = 1usize;
    loop {
        let candidate = PathBuf::from(format!("{base}_{counter}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}
