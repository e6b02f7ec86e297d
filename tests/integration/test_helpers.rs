//! Shared fixtures for integration tests.
//!
//! Tests run against a stand-in editor: a POSIX shell script that answers
//! `--version` and otherwise executes the file named by the
//! `-c "source <file>"` argument as a shell script. Test definitions are
//! therefore small shell scripts that write to `$YAC_TEST_OUTPUT` or print
//! `[PASS]` / `[FAIL]` tokens, which keeps the tests independent of a real
//! Vim installation.

use std::fs;
use std::net::SocketAddr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use vim_harness::launcher::Launcher;
use vim_harness::protocol::Connection;
use vim_harness::HarnessConfig;

const FAKE_EDITOR: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
    echo "VIM - Vi IMproved (stand-in)"
    exit 0
fi
for arg in "$@"; do
    case "$arg" in
        -V9*) echo "verbose log opened" > "${arg#-V9}" ;;
    esac
done
for arg in "$@"; do
    case "$arg" in
        "source "*) . "${arg#source }" ;;
    esac
done
exit 0
"#;

/// A temporary project with a stand-in editor and an empty test directory.
pub struct Project {
    pub dir: TempDir,
    pub editor: PathBuf,
}

impl Project {
    /// Project root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Directory holding handoff files and logs.
    pub fn scratch(&self) -> PathBuf {
        self.root().join("scratch")
    }

    /// Write a test definition `tests/vim/<id>.vim` with a shell body.
    pub fn write_test(&self, id: &str, body: &str) {
        fs::write(self.root().join("tests/vim").join(format!("{id}.vim")), body)
            .expect("write test definition");
    }

    /// Configuration rooted at the project, plus extra top-level TOML.
    pub fn config(&self, extra: &str) -> Arc<HarnessConfig> {
        self.config_with(extra, "")
    }

    /// Configuration with extra top-level TOML and extra `[editor]` keys.
    pub fn config_with(&self, extra: &str, editor: &str) -> Arc<HarnessConfig> {
        let raw = format!(
            "project_root = '{root}'\nhandoff_dir = 'scratch'\n{extra}\n[editor]\ncandidates = ['{program}']\n{editor}\n",
            root = self.root().display(),
            program = self.editor.display(),
        );
        Arc::new(HarnessConfig::from_toml_str(&raw).expect("valid test config"))
    }

    /// Launcher around the stand-in editor.
    pub fn launcher(&self, config: &Arc<HarnessConfig>) -> Launcher {
        Launcher::with_editor(Arc::clone(config), self.editor.to_string_lossy())
            .expect("launcher")
    }

    /// Names of files left in the scratch directory.
    pub fn leftovers(&self) -> Vec<String> {
        fs::read_dir(self.scratch())
            .expect("read scratch dir")
            .map(|entry| {
                entry
                    .expect("dir entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }
}

/// Create a project with `tests/vim`, a scratch directory and the
/// stand-in editor.
pub fn project() -> Project {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join("tests/vim")).expect("create test dir");
    fs::create_dir_all(dir.path().join("scratch")).expect("create scratch dir");
    fs::write(dir.path().join("vimrc"), "").expect("write vimrc");

    let editor = dir.path().join("fake-vim");
    fs::write(&editor, FAKE_EDITOR).expect("write stand-in editor");
    fs::set_permissions(&editor, fs::Permissions::from_mode(0o755)).expect("chmod editor");

    Project { dir, editor }
}

/// Loopback server that answers every framed message by echoing it back.
pub async fn spawn_echo_server() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("local addr");
    let handle = tokio::spawn(async move {
        while let Ok((stream, peer)) = listener.accept().await {
            tokio::spawn(async move {
                let mut conn = Connection::new(stream, peer.to_string());
                while let Some(message) = conn.receive(std::time::Duration::from_secs(30)).await {
                    if conn.send(&message).await.is_err() {
                        break;
                    }
                }
            });
        }
    });
    (address, handle)
}
