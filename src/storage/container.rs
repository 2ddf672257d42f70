//! Binary dataset containers
//!
//! Layout:
//!
//! ```text
//! ┌──────────────────────┬─────────┬───────────────────────────────┐
//! │ magic "\x89ECTDSC\n" │ version │ payload                       │
//! │ 8 bytes              │ 1 byte  │ JSON dataset, gzip when v = 2 │
//! └──────────────────────┴─────────┴───────────────────────────────┘
//! ```
//!
//! Both container formats read either version. They only differ in the
//! version they write.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::format::{FormatHandler, HandlerError};
use crate::domain::{Dataset, Value};

const MAGIC: &[u8; 8] = b"\x89ECTDSC\n";

/// Fitness of a container handler for anything it accepts
const CONTAINER_FITNESS: i32 = 100_000;

/// Payload encoding of a container file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerEncoding {
    Plain = 1,
    Gzip = 2,
}

impl ContainerEncoding {
    fn from_version(version: u8) -> Option<Self> {
        match version {
            1 => Some(Self::Plain),
            2 => Some(Self::Gzip),
            _ => None,
        }
    }
}

/// Opens `path` and validates the container header
///
/// The file handle is returned positioned at the payload and is closed when
/// dropped, on success and on every error path.
fn open_container(path: &Path) -> Result<(BufReader<File>, ContainerEncoding), HandlerError> {
    let mut reader = BufReader::new(File::open(path)?);

    let mut header = [0u8; 9];
    reader
        .read_exact(&mut header)
        .map_err(|_| HandlerError::Container("file too short".to_string()))?;

    if &header[..8] != MAGIC {
        return Err(HandlerError::Container("bad magic".to_string()));
    }

    let encoding = ContainerEncoding::from_version(header[8])
        .ok_or_else(|| HandlerError::Container(format!("unsupported version {}", header[8])))?;

    Ok((reader, encoding))
}

/// Reads a full dataset from a container file
pub fn read_dataset(path: &Path) -> Result<Dataset, HandlerError> {
    let (reader, encoding) = open_container(path)?;
    let dataset = match encoding {
        ContainerEncoding::Plain => serde_json::from_reader(reader)?,
        ContainerEncoding::Gzip => serde_json::from_reader(GzDecoder::new(reader))?,
    };
    Ok(dataset)
}

/// Writes a dataset to a container file with the given payload encoding
pub fn write_dataset(
    dataset: &Dataset,
    path: &Path,
    encoding: ContainerEncoding,
) -> Result<(), HandlerError> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(MAGIC)?;
    writer.write_all(&[encoding as u8])?;

    match encoding {
        ContainerEncoding::Plain => serde_json::to_writer(&mut writer, dataset)?,
        ContainerEncoding::Gzip => {
            let mut encoder = GzEncoder::new(&mut writer, Compression::default());
            serde_json::to_writer(&mut encoder, dataset)?;
            encoder.finish()?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Dataset container format; one instance per written encoding
#[derive(Debug, Clone, Copy)]
pub struct DatasetFormat {
    name: &'static str,
    description: &'static str,
    encoding: ContainerEncoding,
}

impl DatasetFormat {
    /// Container with an uncompressed payload
    pub fn plain() -> Self {
        Self {
            name: "DATASET",
            description: "Binary dataset container with uncompressed payload",
            encoding: ContainerEncoding::Plain,
        }
    }

    /// Container with a gzip-compressed payload
    pub fn compressed() -> Self {
        Self {
            name: "DATASET_GZ",
            description: "Binary dataset container with gzip-compressed payload",
            encoding: ContainerEncoding::Gzip,
        }
    }

    pub fn encoding(&self) -> ContainerEncoding {
        self.encoding
    }
}

impl FormatHandler for DatasetFormat {
    fn format_name(&self) -> &str {
        self.name
    }

    fn filename_ext(&self) -> &str {
        ".dsc"
    }

    fn description(&self) -> &str {
        self.description
    }

    fn read_fitness(&self, source: &Path) -> Result<i32, HandlerError> {
        open_container(source)?;
        Ok(CONTAINER_FITNESS)
    }

    fn write_fitness(&self, value: &Value) -> Result<i32, HandlerError> {
        Ok(match value {
            Value::Dataset(_) => CONTAINER_FITNESS,
            _ => 0,
        })
    }

    fn read(&self, source: &Path) -> Result<Value, HandlerError> {
        Ok(Value::from(read_dataset(source)?))
    }

    fn write(&self, value: &Value, destination: &Path) -> Result<(), HandlerError> {
        let dataset = value
            .as_dataset()
            .ok_or(HandlerError::Unsupported(value.type_name()))?;
        write_dataset(dataset, destination, self.encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sample() -> Dataset {
        Dataset::new()
            .with_dim("lat", 2)
            .with_dim("lon", 2)
            .with_var("sst", &["lat", "lon"], vec![271.5, 272.0, 280.25, 281.0])
            .with_attr("title", "SST sample")
    }

    #[test]
    fn both_encodings_round_trip() {
        let dir = TempDir::new().unwrap();

        for format in [DatasetFormat::plain(), DatasetFormat::compressed()] {
            let path = dir.path().join(format!("{}.dsc", format.format_name()));
            format.write(&Value::from(sample()), &path).unwrap();

            let bytes = fs::read(&path).unwrap();
            assert_eq!(&bytes[..8], MAGIC);
            assert_eq!(bytes[8], format.encoding() as u8);

            // Either handler reads either encoding
            assert_eq!(DatasetFormat::plain().read(&path).unwrap(), Value::from(sample()));
            assert_eq!(DatasetFormat::compressed().read(&path).unwrap(), Value::from(sample()));
        }
    }

    #[test]
    fn fill_values_survive_both_encodings() {
        let dir = TempDir::new().unwrap();
        let ds = Dataset::new()
            .with_dim("x", 3)
            .with_var("sst", &["x"], vec![271.5, f64::NAN, f64::NEG_INFINITY]);

        for format in [DatasetFormat::plain(), DatasetFormat::compressed()] {
            let path = dir.path().join(format!("{}.dsc", format.format_name()));
            format.write(&Value::from(ds.clone()), &path).unwrap();

            let read = read_dataset(&path).unwrap();
            let data = &read.variables["sst"].data;
            assert_eq!(data[0], 271.5);
            assert!(data[1].is_nan());
            assert_eq!(data[2], f64::NEG_INFINITY);
        }
    }

    #[test]
    fn probe_rejects_non_containers() {
        let dir = TempDir::new().unwrap();
        let text = dir.path().join("notes.dsc");
        fs::write(&text, "just some text").unwrap();

        assert!(DatasetFormat::plain().read_fitness(&text).is_err());
        assert!(DatasetFormat::plain().read_fitness(&dir.path().join("missing.dsc")).is_err());
    }

    #[test]
    fn probe_rejects_unknown_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("future.dsc");
        let mut bytes = MAGIC.to_vec();
        bytes.push(9);
        fs::write(&path, bytes).unwrap();

        let err = DatasetFormat::compressed().read_fitness(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported version 9"));
    }

    #[test]
    fn repeated_probing_releases_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ok.dsc");
        DatasetFormat::plain().write(&Value::from(sample()), &path).unwrap();

        // Far more probes than a typical descriptor limit
        for _ in 0..5000 {
            assert_eq!(DatasetFormat::plain().read_fitness(&path).unwrap(), CONTAINER_FITNESS);
        }
    }

    #[test]
    fn writes_only_datasets() {
        let dir = TempDir::new().unwrap();
        let err = DatasetFormat::plain()
            .write(&Value::from("text"), &dir.path().join("x.dsc"))
            .unwrap_err();
        assert!(matches!(err, HandlerError::Unsupported("str")));
        assert_eq!(DatasetFormat::plain().write_fitness(&Value::Int(1)).unwrap(), 0);
    }
}
