//! CSV export of the merged database, one row per current entry plus one
//! per alternate.

use crate::database::BackupDatabase;
use crate::error::Result;
use csv::WriterBuilder;

/// Render the database as CSV bytes with columns `tar_file, filename,
/// size, modified, sha`. String fields are quoted, `size` is bare, exactly
/// reproducing Python's `csv.QUOTE_NONNUMERIC` shape: the `csv` crate's
/// `QuoteStyle` is a writer-wide setting, not a per-field one, so quoting
/// is built with `QuoteStyle::Never` and the string fields are pre-quoted.
pub fn render_csv(db: &BackupDatabase) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Never)
        .has_headers(false)
        .from_writer(Vec::new());

    for (_name, entry) in db.iter() {
        write_row(&mut writer, &entry.manifest_id.to_string(), &entry.entry)?;
        for alt in &entry.alt {
            write_row(&mut writer, &alt.manifest_id.to_string(), &alt.entry)?;
        }
    }

    Ok(writer.into_inner().map_err(|e| crate::error::BackupError::Transport(e.to_string()))?)
}

fn write_row(
    writer: &mut csv::Writer<Vec<u8>>,
    manifest_id: &str,
    entry: &crate::manifest::FileEntry,
) -> Result<()> {
    let tar_file = format!("{manifest_id}.tar");
    writer.write_record([
        quote(&tar_file),
        quote(&entry.name),
        entry.size.to_string(),
        quote(&entry.modified.to_rfc3339()),
        quote(&entry.sha),
    ])?;
    Ok(())
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}
