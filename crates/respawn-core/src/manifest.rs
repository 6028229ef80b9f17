use std::io;
use std::path::Path;

/// Line-oriented list of required packages, one entry per line.
///
/// Blank lines and lines starting with `#` are ignored. Entries are kept
/// verbatim (version pins and the like are the installer's business).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
	pub packages: Vec<String>,
}

impl Manifest {
	pub fn parse(text: &str) -> Self {
		let packages = text
			.lines()
			.map(str::trim)
			.filter(|line| !line.is_empty() && !line.starts_with('#'))
			.map(str::to_string)
			.collect();
		Self { packages }
	}

	/// Read and parse a manifest file. A missing file surfaces as
	/// `io::ErrorKind::NotFound`; callers treat that as nothing to install.
	pub fn load(path: &Path) -> io::Result<Self> {
		let text = std::fs::read_to_string(path)?;
		Ok(Self::parse(&text))
	}

	pub fn is_empty(&self) -> bool {
		self.packages.is_empty()
	}

	pub fn len(&self) -> usize {
		self.packages.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_skips_comments_and_blanks() {
		let m = Manifest::parse("# deps\nrequests\n\n   \npyyaml>=6.0\n# trailing\n");
		assert_eq!(m.packages, vec!["requests", "pyyaml>=6.0"]);
	}

	#[test]
	fn parse_trims_whitespace() {
		let m = Manifest::parse("  requests  \n\tnumpy\n");
		assert_eq!(m.packages, vec!["requests", "numpy"]);
	}

	#[test]
	fn parse_empty_input() {
		assert!(Manifest::parse("").is_empty());
		assert!(Manifest::parse("# only comments\n\n").is_empty());
		assert_eq!(Manifest::parse("").len(), 0);
	}

	#[test]
	fn load_missing_file_is_not_found() {
		let err = Manifest::load(Path::new("/definitely/missing/requirements.txt")).unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::NotFound);
	}
}
