use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

const MMAP_THRESHOLD: u64 = 1024 * 1024; // 1 MiB

/// Source text, either mapped from disk or read into memory.
/// Both variants hold validated UTF-8.
pub enum FileContent {
    Mapped(Mmap),
    Buffered(String),
}

impl AsRef<str> for FileContent {
    fn as_ref(&self) -> &str {
        match self {
            // Validated in read_file_smart
            FileContent::Mapped(mmap) => std::str::from_utf8(mmap).unwrap_or_default(),
            FileContent::Buffered(s) => s.as_str(),
        }
    }
}

pub fn read_file_smart<P: AsRef<Path>>(path: P) -> Result<FileContent> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?;

    if metadata.len() > MMAP_THRESHOLD {
        // Use memory mapping for large files
        let file =
            File::open(path).with_context(|| format!("Failed to open file {}", path.display()))?;

        // Safety: We're only reading the file, not modifying it
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to memory-map {}", path.display()))?;

        std::str::from_utf8(&mmap)
            .with_context(|| format!("{} is not valid UTF-8", path.display()))?;

        Ok(FileContent::Mapped(mmap))
    } else {
        // Read small files into memory
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file {}", path.display()))?;

        Ok(FileContent::Buffered(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn small_files_are_buffered() -> Result<()> {
        let mut f = tempfile::NamedTempFile::new()?;
        f.write_all(b"def f():\n    pass\n")?;
        let content = read_file_smart(f.path())?;
        assert!(matches!(content, FileContent::Buffered(_)));
        assert_eq!(content.as_ref(), "def f():\n    pass\n");
        Ok(())
    }

    #[test]
    fn large_files_are_mapped() -> Result<()> {
        let mut f = tempfile::NamedTempFile::new()?;
        let line = "x = 1\n";
        let body = line.repeat((MMAP_THRESHOLD as usize / line.len()) + 10);
        f.write_all(body.as_bytes())?;
        let content = read_file_smart(f.path())?;
        assert!(matches!(content, FileContent::Mapped(_)));
        assert_eq!(content.as_ref().len(), body.len());
        Ok(())
    }

    #[test]
    fn invalid_utf8_names_the_file() -> Result<()> {
        let mut f = tempfile::NamedTempFile::new()?;
        f.write_all(&[0x66, 0xff, 0xfe])?;
        let err = read_file_smart(f.path()).err().map(|e| format!("{e:#}"));
        assert!(err.is_some_and(|e| e.contains(&f.path().display().to_string())));
        Ok(())
    }
}
