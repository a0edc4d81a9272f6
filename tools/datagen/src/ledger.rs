use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;

/// Append-only file of confirmed-created account identifiers, one per
/// line. Each append writes a whole line behind a lock, so concurrent
/// provisioning items cannot interleave partial identifiers.
pub struct Ledger {
    file: Mutex<File>,
    path: PathBuf,
}

impl Ledger {
    /// Opens `path` for appending, creating it if absent. An existing
    /// ledger is extended, never truncated.
    pub async fn append_to(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            file: Mutex::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one identifier as its own line.
    pub async fn record(&self, identifier: &str) -> io::Result<()> {
        let mut file = self.file.lock().await;
        file.write_all(format!("{}\n", identifier).as_bytes()).await?;
        file.flush().await
    }
}

/// Opens a ledger for reading and yields its lines incrementally, so
/// arbitrarily large ledgers never have to be loaded whole.
pub async fn open_lines(path: &Path) -> io::Result<Lines<BufReader<File>>> {
    let file = File::open(path).await?;
    Ok(BufReader::new(file).lines())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use tempfile::tempdir;

    async fn read_back(path: &Path) -> Vec<String> {
        let mut lines = open_lines(path).await.unwrap();
        let mut out = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            out.push(line);
        }
        out
    }

    #[tokio::test]
    async fn records_one_identifier_per_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("genUIDS");

        let ledger = Ledger::append_to(&path).await.unwrap();
        ledger.record("uid-1").await.unwrap();
        ledger.record("uid-2").await.unwrap();

        assert_eq!(read_back(&path).await, vec!["uid-1", "uid-2"]);
    }

    #[tokio::test]
    async fn reopening_appends_instead_of_truncating() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("genUIDS");

        let first = Ledger::append_to(&path).await.unwrap();
        first.record("uid-1").await.unwrap();
        drop(first);

        let second = Ledger::append_to(&path).await.unwrap();
        second.record("uid-2").await.unwrap();

        assert_eq!(read_back(&path).await, vec!["uid-1", "uid-2"]);
    }

    #[tokio::test]
    async fn concurrent_appends_stay_line_atomic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("genUIDS");
        let ledger = Ledger::append_to(&path).await.unwrap();

        let identifiers: Vec<String> = (0..20).map(|i| format!("uid-{}", i)).collect();
        for result in join_all(identifiers.iter().map(|id| ledger.record(id))).await {
            result.unwrap();
        }

        let mut lines = read_back(&path).await;
        lines.sort();
        let mut expected = identifiers.clone();
        expected.sort();
        assert_eq!(lines, expected);
    }
}
