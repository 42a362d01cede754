//! Generates an ESP-IDF component that embeds binary files (FPGA bitstreams)
//! into flash and exposes them through a name -> start/end table.
//!
//! The linker symbols come from objcopy, which names them
//! `_binary_<file name with non-alphanumerics replaced by _>_start/_end`.

use crate::utils::error::{DeviceError, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone)]
pub struct RomComponent {
    pub name: String,
    pub files: Vec<PathBuf>,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeSummary {
    pub entries: Vec<(String, u64)>,
}

impl SizeSummary {
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, size)| size).sum()
    }
}

impl fmt::Display for SizeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>8} filename", "size")?;
        for (name, size) in &self.entries {
            writeln!(f, "{:>8} {}", size, name)?;
        }
        write!(f, "Total size: {}", self.total())
    }
}

/// Symbol stem objcopy derives from a file name.
pub fn symbol_stem(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| DeviceError::InvalidInput {
            message: format!("'{}' has no usable file name", path.display()),
        })
}

fn is_c_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `git describe --tags --dirty --broken` for the repository containing `directory`.
pub fn git_version(directory: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--dirty", "--broken"])
        .current_dir(directory)
        .output()?;

    if !output.status.success() {
        return Err(DeviceError::InvalidInput {
            message: format!(
                "git describe failed in {}: {}",
                directory.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

impl RomComponent {
    pub fn new(name: &str, files: Vec<PathBuf>, version: &str) -> Result<Self> {
        if !is_c_identifier(name) {
            return Err(DeviceError::InvalidInput {
                message: format!("component name '{}' is not a valid C identifier", name),
            });
        }
        if files.is_empty() {
            return Err(DeviceError::InvalidInput {
                message: "at least one file must be embedded".to_string(),
            });
        }
        // Validate early so rendering cannot fail halfway through.
        for file in &files {
            file_name(file)?;
        }

        Ok(Self {
            name: name.to_string(),
            files,
            version: version.to_string(),
        })
    }

    fn names(&self) -> Vec<String> {
        self.files
            .iter()
            .filter_map(|f| file_name(f).ok())
            .collect()
    }

    pub fn render_cmake(&self) -> String {
        let mut out = String::from("set(embed");
        for file in &self.files {
            out.push_str(&format!("\n    \"../../{}\"", file.display()));
        }
        out.push_str(")\n\n");
        out.push_str("idf_component_register(\n");
        out.push_str(&format!("    SRCS \"{}.c\"\n", self.name));
        out.push_str("    INCLUDE_DIRS \"include\"\n");
        out.push_str("    EMBED_FILES \"${embed}\")\n");
        out
    }

    pub fn render_header(&self) -> String {
        let name = &self.name;
        let upper = name.to_uppercase();
        let mut out = String::new();
        out.push_str("#pragma once\n\n");
        out.push_str("#include <stdint.h>\n\n");
        out.push_str(&format!("#define {}_VERSION \"{}\"\n\n", upper, self.version));
        out.push_str(&format!("//! @brief {} file table entry\n", name));
        out.push_str("typedef struct {\n");
        out.push_str("    const char *name;         //!< File name\n");
        out.push_str("    const uint8_t *start;     //!< Pointer to the start of the file in ROM\n");
        out.push_str("    const uint8_t *end;       //!< Pointer to the end of the file in ROM\n");
        out.push_str(&format!("}} {}_entry_t;\n\n", name));
        out.push_str(&format!(
            "#define {}_ENTRY_COUNT {}     //!< Number of entries in the {} table\n\n",
            upper,
            self.files.len(),
            name
        ));
        out.push_str(&format!("//! @brief {} entry table\n", name));
        out.push_str(&format!(
            "extern const {0}_entry_t {0}_entries[{1}_ENTRY_COUNT];\n",
            name, upper
        ));
        out
    }

    pub fn render_source(&self) -> String {
        let name = &self.name;
        let names = self.names();
        let mut out = String::new();
        out.push_str("#include <stdint.h>\n");
        out.push_str(&format!("#include \"{}.h\"\n\n", name));

        for file in &names {
            let stem = symbol_stem(file);
            out.push_str(&format!(
                "extern const unsigned char {0}_start asm(\"_binary_{0}_start\");\n",
                stem
            ));
            out.push_str(&format!(
                "extern const unsigned char {0}_end asm(\"_binary_{0}_end\");\n",
                stem
            ));
        }

        out.push_str(&format!(
            "\nconst {0}_entry_t {0}_entries[{1}_ENTRY_COUNT] = {{\n",
            name,
            name.to_uppercase()
        ));
        for file in &names {
            let stem = symbol_stem(file);
            out.push_str("    {\n");
            out.push_str(&format!("        .name = \"{}\",\n", file));
            out.push_str(&format!("        .start = &{}_start,\n", stem));
            out.push_str(&format!("        .end = &{}_end,\n", stem));
            out.push_str("    },\n");
        }
        out.push_str("};\n");
        out
    }

    /// Recreates `<project_dir>/components/<name>/` and returns the embedded file sizes.
    /// File paths are resolved against `project_dir`.
    pub fn write(&self, project_dir: &Path) -> Result<SizeSummary> {
        let mut entries = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let size = fs::metadata(project_dir.join(file))?.len();
            entries.push((file_name(file)?, size));
        }

        let target = project_dir.join("components").join(&self.name);
        if target.is_dir() {
            fs::remove_dir_all(&target)?;
        }
        fs::create_dir_all(target.join("include"))?;

        fs::write(target.join("CMakeLists.txt"), self.render_cmake())?;
        fs::write(
            target.join("include").join(format!("{}.h", self.name)),
            self.render_header(),
        )?;
        fs::write(target.join(format!("{}.c", self.name)), self.render_source())?;

        tracing::info!(
            "Wrote component {} ({} files) to {}",
            self.name,
            self.files.len(),
            target.display()
        );
        Ok(SizeSummary { entries })
    }
}
