// SPDX-License-Identifier: BSD-3-Clause

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use super::io;

/// Reads the object module at `object` and writes the full dump into
/// `write`. Decode diagnostics are part of the dump itself; only
/// failing to read the file is an error.
pub fn dump(write: &mut impl Write, object: &Path) -> Result<()> {
    let image = io::read_image(object)?;
    write!(write, "{}", image.scan())?;
    Ok(())
}
