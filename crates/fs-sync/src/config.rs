use crate::error::Error;

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use normpath::PathExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Always ignored, whatever the user configures.
///
/// In case of doubt about globs, consult <https://docs.rs/globset/latest/globset/#syntax>
pub const DEFAULT_IGNORE_GLOBS: &[&str] = &[
	// Editors and OS droppings
	"**/*.un~",
	"**/.DS_Store",
	// Version control
	"**/.git",
	"**/.hg",
	"**/.svn",
	"**/.gitignore",
	"**/.npmignore",
	"**/.babelrc",
	// Lockfiles
	"**/yarn.lock",
	"**/package-lock.json",
	"**/pnpm-lock.yaml",
	"**/Cargo.lock",
	// Dependencies
	"**/node_modules",
	"**/bower_components",
	// Build output
	"**/dist",
	"**/target",
];

pub const DEFAULT_SOURCE_NAME: &str = "fs";

fn default_source_name() -> String {
	DEFAULT_SOURCE_NAME.to_string()
}

/// User facing configuration of one watched root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
	/// Relative roots are resolved against the current working directory
	pub root: PathBuf,
	#[serde(default = "default_source_name")]
	pub name: String,
	/// Extra globs, merged with [`DEFAULT_IGNORE_GLOBS`]
	#[serde(default)]
	pub ignore: Vec<String>,
	#[serde(default)]
	pub follow_symlinks: bool,
}

impl SyncConfig {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			name: default_source_name(),
			ignore: Vec::new(),
			follow_symlinks: false,
		}
	}

	#[must_use]
	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	#[must_use]
	pub fn with_ignore(mut self, globs: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.ignore.extend(globs.into_iter().map(Into::into));
		self
	}

	#[must_use]
	pub const fn with_follow_symlinks(mut self, follow_symlinks: bool) -> Self {
		self.follow_symlinks = follow_symlinks;
		self
	}

	/// Resolves and checks the root, then compiles the ignore rules.
	///
	/// Every error returned here is fatal, no watcher must be created after a failure.
	pub fn validate(&self) -> Result<ValidatedConfig, Error> {
		let root = if self.root.is_absolute() {
			self.root.clone()
		} else {
			std::env::current_dir()
				.map_err(Error::WorkingDirectory)?
				.join(&self.root)
		};

		// Normalizing also checks that the path exists
		let root = root
			.normalize()
			.map_err(|_| Error::RootNotFound(root.as_path().into()))?
			.into_path_buf();

		if !root.is_dir() {
			return Err(Error::RootNotDirectory(root.into()));
		}

		let ignore = IgnoreRules::new(&root, &self.ignore)?;

		debug!(root = %root.display(), name = %self.name, "Validated configuration;");

		Ok(ValidatedConfig {
			root,
			name: self.name.clone(),
			ignore,
			follow_symlinks: self.follow_symlinks,
		})
	}
}

#[derive(Debug, Clone)]
pub struct ValidatedConfig {
	root: PathBuf,
	name: String,
	ignore: IgnoreRules,
	follow_symlinks: bool,
}

impl ValidatedConfig {
	/// Absolute and normalized
	#[must_use]
	pub fn root(&self) -> &Path {
		&self.root
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[must_use]
	pub const fn ignore(&self) -> &IgnoreRules {
		&self.ignore
	}

	#[must_use]
	pub const fn follow_symlinks(&self) -> bool {
		self.follow_symlinks
	}
}

/// Ignore globs scoped to a root.
///
/// A path is ignored when it or any of its ancestors below the root matches, so ignoring a directory
/// also ignores everything inside it. The root itself is never ignored.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
	root: PathBuf,
	globs: Vec<Glob>,
	glob_set: GlobSet,
}

impl IgnoreRules {
	pub fn new(
		root: impl Into<PathBuf>,
		extra_globs: impl IntoIterator<Item = impl AsRef<str>>,
	) -> Result<Self, Error> {
		let globs = DEFAULT_IGNORE_GLOBS
			.iter()
			.map(|s| s.parse::<Glob>())
			.chain(extra_globs.into_iter().map(|s| s.as_ref().parse::<Glob>()))
			.collect::<Result<Vec<_>, _>>()?;

		let glob_set = globs
			.iter()
			.cloned()
			.fold(&mut GlobSetBuilder::new(), |builder, glob| {
				builder.add(glob)
			})
			.build()?;

		Ok(Self {
			root: root.into(),
			globs,
			glob_set,
		})
	}

	#[must_use]
	pub fn globs(&self) -> &[Glob] {
		&self.globs
	}

	#[must_use]
	pub fn is_ignored(&self, path: impl AsRef<Path>) -> bool {
		let path = path.as_ref();

		if !path.starts_with(&self.root) {
			return self.glob_set.is_match(path);
		}

		path.ancestors()
			.take_while(|ancestor| *ancestor != self.root)
			.any(|ancestor| self.glob_set.is_match(ancestor))
	}
}
