use crate::error::GroupError;
use calamine::{Data, Range, Reader, Xls, Xlsx};
use std::io::Cursor;
use std::path::Path;

/// File categories the importer understands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportFormat {
    /// `.txt` and `.csv`: the file content is the list
    Text,
    /// `.xlsx`: Office Open XML workbook
    Xlsx,
    /// `.xls`: legacy binary workbook
    Xls,
}

impl ImportFormat {
    /// Detect the format from a file name's extension, ignoring case
    ///
    /// # Examples
    /// ```
    /// use autogroup::loader::ImportFormat;
    ///
    /// assert_eq!(ImportFormat::from_file_name("names.CSV"), Ok(ImportFormat::Text));
    /// assert!(ImportFormat::from_file_name("names.pdf").is_err());
    /// ```
    pub fn from_file_name(file_name: &str) -> Result<Self, GroupError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("txt") | Some("csv") => Ok(ImportFormat::Text),
            Some("xlsx") => Ok(ImportFormat::Xlsx),
            Some("xls") => Ok(ImportFormat::Xls),
            Some(ext) => Err(GroupError::UnsupportedFormat(format!(
                "unsupported file extension: {}",
                ext
            ))),
            None => Err(GroupError::UnsupportedFormat(format!(
                "file has no extension: {}",
                file_name
            ))),
        }
    }
}

/// Read a list from a file on disk
///
/// The extension is checked before the file is opened, so an unsupported
/// file is never read.
///
/// # Examples
/// ```no_run
/// use autogroup::loader::import_from;
///
/// match import_from("class.xlsx") {
///     Ok(text) => println!("imported {} bytes of list text", text.len()),
///     Err(e) => eprintln!("{}", e),
/// }
/// ```
pub fn import_from(filepath: impl AsRef<Path>) -> Result<String, GroupError> {
    let path = filepath.as_ref();
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let format = ImportFormat::from_file_name(file_name)?;

    let bytes = std::fs::read(path)
        .map_err(|e| GroupError::ImportFailed(format!("{}: {}", path.display(), e)))?;

    import_format(format, bytes)
}

/// Turn uploaded file content into raw list text
///
/// Text and CSV files pass through unchanged (invalid UTF-8 sequences are
/// replaced). Spreadsheets contribute every non-blank cell of their first
/// sheet, read row by row and joined with newlines.
pub fn import_bytes(file_name: &str, bytes: Vec<u8>) -> Result<String, GroupError> {
    let format = ImportFormat::from_file_name(file_name)?;
    import_format(format, bytes)
}

fn import_format(format: ImportFormat, bytes: Vec<u8>) -> Result<String, GroupError> {
    let text = match format {
        ImportFormat::Text => String::from_utf8_lossy(&bytes).into_owned(),
        ImportFormat::Xlsx => {
            let mut workbook = Xlsx::new(Cursor::new(bytes))
                .map_err(|e| GroupError::ImportFailed(format!("failed to open XLSX: {}", e)))?;
            let range = workbook
                .worksheet_range_at(0)
                .ok_or_else(|| GroupError::ImportFailed("workbook has no sheets".into()))?
                .map_err(|e| GroupError::ImportFailed(format!("failed to read sheet: {}", e)))?;
            flatten_cells(&range)
        }
        ImportFormat::Xls => {
            let mut workbook = Xls::new(Cursor::new(bytes))
                .map_err(|e| GroupError::ImportFailed(format!("failed to open XLS: {}", e)))?;
            let range = workbook
                .worksheet_range_at(0)
                .ok_or_else(|| GroupError::ImportFailed("workbook has no sheets".into()))?
                .map_err(|e| GroupError::ImportFailed(format!("failed to read sheet: {}", e)))?;
            flatten_cells(&range)
        }
    };

    log::debug!("imported {:?} file into {} bytes of text", format, text.len());
    Ok(text)
}

// Row-major walk of the sheet, skipping empty cells
fn flatten_cells(range: &Range<Data>) -> String {
    range
        .rows()
        .flat_map(|row| row.iter())
        .filter(|cell| !is_empty_cell(cell))
        .map(|cell| cell.to_string())
        .filter(|value| !value.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// Zero and FALSE count as empty, like blank cells
fn is_empty_cell(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::Int(value) => *value == 0,
        Data::Float(value) => *value == 0.0,
        Data::Bool(value) => !value,
        _ => false,
    }
}
