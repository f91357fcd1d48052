use std::{
    fs::File,
    io::{self, BufWriter, Write as _},
    path::Path,
};

use anyhow::Context as _;

/// Writes a value as pretty JSON to `path`, creating or truncating the file.
pub fn save_json<T>(value: &T, path: &Path) -> anyhow::Result<()>
where
    T: serde::Serialize,
{
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("Failed to write JSON to {}", path.display()))?;
    writeln!(writer)
        .and_then(|()| writer.flush())
        .with_context(|| format!("Failed to flush output to {}", path.display()))?;
    Ok(())
}

/// Reads a JSON file into a value; `file_kind` names the file in errors.
pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", file_kind, path.display()))?;
    let reader = io::BufReader::new(file);
    serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse {} JSON file: {}", file_kind, path.display()))
}
