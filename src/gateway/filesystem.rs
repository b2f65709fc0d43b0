//! Filesystem Bridge
//!
//! File operations confined beneath a fixed base directory. Every
//! user-supplied path goes through [`sanitize_path`] before it is joined to
//! the base, so traversal and absolute paths land inside the root. Symbolic
//! links that already exist under the root are followed.

use super::{require, Gateway, SuccessPolicy, ToolResponse};
use crate::error::{FsError, GatewayError, ValidationError};
use crate::tools::{sanitize_path, split_arguments, CommandSpec, ExecutionTimeout};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Path-confined file operations under one root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemBridge {
    root: PathBuf,
}

impl FilesystemBridge {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a user path to a location under the root
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(sanitize_path(path))
    }

    /// Read a UTF-8 text file
    pub async fn read(&self, path: &str) -> Result<String, FsError> {
        let full = self.resolve(path);

        let metadata = fs::metadata(&full).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FsError::NotFound {
                kind: "File",
                path: path.to_string(),
            },
            _ => FsError::from_io("reading file", path, e),
        })?;
        if !metadata.is_file() {
            return Err(FsError::NotAFile {
                path: path.to_string(),
            });
        }

        let bytes = fs::read(&full)
            .await
            .map_err(|e| FsError::from_io("reading file", path, e))?;
        String::from_utf8(bytes).map_err(|_| FsError::Binary {
            path: path.to_string(),
        })
    }

    /// Write text, creating parent directories and overwriting any existing file
    ///
    /// Returns the number of bytes written.
    pub async fn write(&self, path: &str, content: &str) -> Result<usize, FsError> {
        let full = self.resolve(path);

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FsError::from_io("writing file", path, e))?;
        }
        fs::write(&full, content)
            .await
            .map_err(|e| FsError::from_io("writing file", path, e))?;

        info!(path = %full.display(), bytes = content.len(), "File written");
        Ok(content.len())
    }

    /// List immediate children in sorted order
    ///
    /// A child that cannot be inspected is reported in place instead of
    /// failing the whole listing.
    pub async fn list(&self, path: &str) -> Result<Vec<String>, FsError> {
        let full = self.resolve(path);

        let metadata = fs::metadata(&full).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FsError::NotFound {
                kind: "Directory",
                path: path.to_string(),
            },
            _ => FsError::from_io("listing directory", path, e),
        })?;
        if !metadata.is_dir() {
            return Err(FsError::NotADirectory {
                path: path.to_string(),
            });
        }

        let mut reader = fs::read_dir(&full)
            .await
            .map_err(|e| FsError::from_io("listing directory", path, e))?;
        let mut names = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| FsError::from_io("listing directory", path, e))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();

        let mut lines = Vec::with_capacity(names.len());
        for name in names {
            lines.push(describe_entry(&full.join(&name), &name).await);
        }
        Ok(lines)
    }

    /// Create a directory and any missing parents
    pub async fn mkdir(&self, path: &str) -> Result<(), FsError> {
        let full = self.resolve(path);
        fs::create_dir_all(&full)
            .await
            .map_err(|e| FsError::from_io("creating directory", path, e))
    }

    /// Delete a file, link or whole directory tree
    ///
    /// Returns `true` when a directory was removed. Paths that resolve to
    /// the root itself are refused before anything is touched.
    pub async fn delete(&self, path: &str) -> Result<bool, FsError> {
        let relative = sanitize_path(path);
        if relative == Path::new(".") {
            warn!(path, "Refusing to delete the filesystem root");
            return Err(FsError::RootDeletion {
                path: path.to_string(),
            });
        }
        let full = self.root.join(relative);

        let metadata = fs::symlink_metadata(&full).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FsError::NotFound {
                kind: "Path",
                path: path.to_string(),
            },
            _ => FsError::from_io("deleting", path, e),
        })?;

        let is_dir = metadata.is_dir();
        let removed = if is_dir {
            fs::remove_dir_all(&full).await
        } else {
            fs::remove_file(&full).await
        };
        removed.map_err(|e| FsError::from_io("deleting", path, e))?;

        info!(path = %full.display(), directory = is_dir, "Path deleted");
        Ok(is_dir)
    }

    /// Resolve a path that must name an existing executable file
    pub async fn executable(&self, path: &str) -> Result<PathBuf, FsError> {
        let full = self.resolve(path);

        let metadata = fs::metadata(&full).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FsError::NotFound {
                kind: "File",
                path: path.to_string(),
            },
            _ => FsError::from_io("executing file", path, e),
        })?;

        if !metadata.is_file() || !is_executable(&metadata) {
            return Err(FsError::NotExecutable {
                path: path.to_string(),
            });
        }
        Ok(full)
    }
}

async fn describe_entry(item: &Path, name: &str) -> String {
    let is_dir = fs::metadata(item)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if is_dir {
        return format!("[DIR]  {}", name);
    }

    match fs::symlink_metadata(item).await {
        Ok(meta) if meta.file_type().is_symlink() => {
            format!("[LINK] {} ({} bytes)", name, meta.len())
        }
        Ok(meta) => format!("[FILE] {} ({} bytes)", name, meta.len()),
        Err(e) => format!("[????] {} (error: {})", name, e),
    }
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    true
}

impl Gateway {
    /// Read a text file under the filesystem root
    pub async fn fs_read(&self, path: &str) -> ToolResponse {
        ToolResponse::from_result(self.fs_read_inner(path).await)
    }

    async fn fs_read_inner(&self, path: &str) -> Result<ToolResponse, GatewayError> {
        require(path, "Path")?;
        let content = self.filesystem.read(path).await?;
        Ok(ToolResponse::success(format!(
            "File: {}\n\nContent:\n{}",
            path, content
        )))
    }

    /// Write a text file under the filesystem root
    pub async fn fs_write(&self, path: &str, content: &str) -> ToolResponse {
        ToolResponse::from_result(self.fs_write_inner(path, content).await)
    }

    async fn fs_write_inner(&self, path: &str, content: &str) -> Result<ToolResponse, GatewayError> {
        require(path, "Path")?;
        if content.is_empty() {
            return Err(ValidationError::EmptyContent.into());
        }
        let written = self.filesystem.write(path, content).await?;
        Ok(ToolResponse::success(format!(
            "Success: Written {} bytes to {}",
            written, path
        )))
    }

    /// Run an executable file under the filesystem root
    ///
    /// No allow-list applies here; confinement to the root is the only gate.
    pub async fn fs_execute(&self, path: &str, arguments: &str) -> ToolResponse {
        ToolResponse::from_result(self.fs_execute_inner(path, arguments).await)
    }

    async fn fs_execute_inner(&self, path: &str, arguments: &str) -> Result<ToolResponse, GatewayError> {
        require(path, "Path")?;
        let program = self.filesystem.executable(path).await?;
        debug!(program = %program.display(), "Executing file from filesystem root");

        let spec = CommandSpec::new(program.to_string_lossy(), split_arguments(arguments));
        let outcome = self
            .execute(spec, ExecutionTimeout::metadata(), false)
            .await;

        Ok(ToolResponse::judged(
            SuccessPolicy::ExitCode.is_success(&outcome),
            || format!("Executed: {}\n\nOutput:\n{}", path, outcome.stdout()),
            || {
                format!(
                    "Executed: {}\nExit code: {}\n\nStderr:\n{}\n\nStdout:\n{}",
                    path,
                    outcome.exit_code(),
                    outcome.stderr(),
                    outcome.stdout()
                )
            },
        ))
    }

    /// List a directory under the filesystem root
    pub async fn fs_list(&self, path: &str) -> ToolResponse {
        match self.filesystem.list(path).await {
            Ok(lines) => ToolResponse::success(format!(
                "Directory listing: {}\n\n{}",
                path,
                lines.join("\n")
            )),
            Err(e) => GatewayError::from(e).into(),
        }
    }

    /// Create a directory under the filesystem root
    pub async fn fs_mkdir(&self, path: &str) -> ToolResponse {
        ToolResponse::from_result(self.fs_mkdir_inner(path).await)
    }

    async fn fs_mkdir_inner(&self, path: &str) -> Result<ToolResponse, GatewayError> {
        require(path, "Path")?;
        self.filesystem.mkdir(path).await?;
        Ok(ToolResponse::success(format!(
            "Success: Created directory {}",
            path
        )))
    }

    /// Delete a file or directory tree under the filesystem root
    pub async fn fs_delete(&self, path: &str) -> ToolResponse {
        ToolResponse::from_result(self.fs_delete_inner(path).await)
    }

    async fn fs_delete_inner(&self, path: &str) -> Result<ToolResponse, GatewayError> {
        require(path, "Path")?;
        let text = if self.filesystem.delete(path).await? {
            format!("Success: Deleted directory {}", path)
        } else {
            format!("Success: Deleted file {}", path)
        };
        Ok(ToolResponse::success(text))
    }
}
