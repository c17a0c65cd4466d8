//! Named byte streams going into and out of the pipeline.
//!
//! A [`SourceAsset`] is what the upload layer hands over: a filename plus a
//! rewindable stream. The pipeline may read it several times (probe, decode,
//! thumbnail), so every reader rewinds before starting. A
//! [`ProcessingOutcome`] is what comes back.

use crate::imaging::OutputFormat;
use crate::imaging::format::extension_of;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Anything the pipeline can read from and rewind.
pub trait AssetStream: Read + Seek + Send {}

impl<T: Read + Seek + Send> AssetStream for T {}

/// An uploaded file: name (with extension), stream, and declared size.
pub struct SourceAsset {
    name: String,
    stream: Box<dyn AssetStream>,
    size_hint: Option<u64>,
}

impl SourceAsset {
    pub fn new(
        name: impl Into<String>,
        stream: impl AssetStream + 'static,
        size_hint: Option<u64>,
    ) -> Self {
        Self {
            name: name.into(),
            stream: Box::new(stream),
            size_hint,
        }
    }

    /// In-memory asset. The size hint is the buffer length.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let len = bytes.len() as u64;
        Self::new(name, Cursor::new(bytes), Some(len))
    }

    /// Open a file on disk. The asset is named after the file name (no
    /// directories) and sized from filesystem metadata.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, BufReader::new(file), Some(len)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same stream under a different name.
    pub fn renamed(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self
        }
    }

    pub fn size_hint(&self) -> Option<u64> {
        self.size_hint
    }

    /// Lowercased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }

    pub fn rewind(&mut self) -> io::Result<()> {
        self.stream.seek(SeekFrom::Start(0)).map(|_| ())
    }

    /// Read the whole stream from the start. Leaves the stream rewound.
    ///
    /// The buffer grows with what is actually read; the declared size is
    /// caller input and never used to reserve memory.
    pub fn read_to_vec(&mut self) -> io::Result<Vec<u8>> {
        self.rewind()?;
        let mut buf = Vec::new();
        self.stream.read_to_end(&mut buf)?;
        self.rewind()?;
        Ok(buf)
    }

    /// Length of the stream, measured by seeking to its end. Leaves the
    /// stream rewound.
    pub fn measured_size(&mut self) -> io::Result<u64> {
        let len = self.stream.seek(SeekFrom::End(0))?;
        self.rewind()?;
        Ok(len)
    }

    /// Declared size, else measured size, else 0.
    pub fn size(&mut self) -> u64 {
        match self.size_hint {
            Some(len) => len,
            None => self.measured_size().unwrap_or(0),
        }
    }
}

impl Read for SourceAsset {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Seek for SourceAsset {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.stream.seek(pos)
    }
}

impl fmt::Debug for SourceAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceAsset")
            .field("name", &self.name)
            .field("size_hint", &self.size_hint)
            .finish_non_exhaustive()
    }
}

/// Replace the final extension of `name`, keeping any directory part.
///
/// `photos/cat.jpeg` → `photos/cat.webp`; names without an extension get one.
pub fn with_extension(name: &str, ext: &str) -> String {
    Path::new(name)
        .with_extension(ext)
        .to_string_lossy()
        .into_owned()
}

/// File stem of `name`: no directories, no final extension.
pub fn stem_of(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image")
}

/// Result of one pipeline invocation.
///
/// When nothing was transformed, `artifact` *is* the input (rewound) and
/// `encoded` is `None`. When a new encoding was produced, the input is handed
/// back in `superseded` so the caller still owns it.
#[derive(Debug)]
pub struct ProcessingOutcome {
    pub artifact: SourceAsset,
    /// Output width; `None` when the input was not decoded as an image.
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub file_size: u64,
    pub was_resized: bool,
    /// Format the artifact was encoded into; `None` for an untouched input.
    pub encoded: Option<OutputFormat>,
    /// The original input when `artifact` is a new encoding.
    pub superseded: Option<SourceAsset>,
}

impl ProcessingOutcome {
    /// Outcome for inputs that were skipped or failed: original, no metadata.
    pub(crate) fn passthrough(mut original: SourceAsset) -> Self {
        if let Err(err) = original.rewind() {
            tracing::warn!(name = original.name(), error = %err, "could not rewind passthrough asset");
        }
        let file_size = original.size();
        Self {
            artifact: original,
            width: None,
            height: None,
            file_size,
            was_resized: false,
            encoded: None,
            superseded: None,
        }
    }

    /// Outcome for decoded images that are kept byte-for-byte (animations,
    /// already-optimized files).
    pub(crate) fn preserved(original: SourceAsset, width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::passthrough(original)
        }
    }

    pub(crate) fn encoded(
        original: SourceAsset,
        name: String,
        bytes: Vec<u8>,
        format: OutputFormat,
        (width, height): (u32, u32),
        was_resized: bool,
    ) -> Self {
        let file_size = bytes.len() as u64;
        Self {
            artifact: SourceAsset::from_bytes(name, bytes),
            width: Some(width),
            height: Some(height),
            file_size,
            was_resized,
            encoded: Some(format),
            superseded: Some(original),
        }
    }

    /// True when the artifact is the untouched input.
    pub fn is_passthrough(&self) -> bool {
        self.encoded.is_none()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }

    /// Give back the caller's original input, whichever field holds it.
    pub fn into_original(self) -> SourceAsset {
        self.superseded.unwrap_or(self.artifact)
    }
}
