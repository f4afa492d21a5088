// SPDX-License-Identifier: BSD-3-Clause

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use super::ObjectImage;

/// Reads an object module file into memory.
///
/// An unreadable or zero-length file is an error; a scan over an empty
/// image would succeed vacuously and hide the problem.
pub fn read_image(path: &Path) -> Result<ObjectImage> {
    let data =
        fs::read(path).with_context(|| format!("could not read {}", path.display()))?;
    if data.is_empty() {
        bail!("{} is empty", path.display());
    }
    Ok(ObjectImage::new(data))
}
