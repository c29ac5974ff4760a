use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not open file {path:?}")]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub fn open_writable(path: impl AsRef<Path>) -> Result<BufWriter<std::fs::File>, Error> {
    let path = path.as_ref();
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|source| Error::OpenFile {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(BufWriter::new(file))
}

pub fn open_readable(path: impl AsRef<Path>) -> Result<BufReader<std::fs::File>, Error> {
    let path = path.as_ref();
    let file = OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(|source| Error::OpenFile {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(BufReader::new(file))
}
