use std::path::{Component, Path};

/// Returns the last component of `path`, or the whole path when it has none.  
/// 取得路徑最後一段名稱；若無（例如 `/`）則回傳完整路徑。
pub fn base_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.to_string_lossy().into_owned(),
    }
}

/// Builds the label shown for `path` in the tree header and status line.  
/// 產生路徑的顯示名稱：位於專案根目錄下時顯示相對路徑，否則顯示檔名。
pub fn display_name(path: &Path, root: Option<&Path>) -> String {
    if let Some(root) = root {
        if let Ok(relative) = path.strip_prefix(root) {
            if relative.as_os_str().is_empty() {
                return base_name(root);
            }
            return join_components(relative);
        }
    }
    base_name(path)
}

fn join_components(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn base_name_uses_last_component() {
        assert_eq!(base_name(Path::new("/proj/src/main.rs")), "main.rs");
        assert_eq!(base_name(Path::new("/")), "/");
    }

    #[test]
    fn display_name_is_relative_inside_root() {
        let root = PathBuf::from("/proj");
        assert_eq!(
            display_name(Path::new("/proj/src/lib.rs"), Some(&root)),
            "src/lib.rs"
        );
        assert_eq!(display_name(Path::new("/proj"), Some(&root)), "proj");
    }

    #[test]
    fn display_name_falls_back_to_base_name() {
        let root = PathBuf::from("/proj");
        assert_eq!(
            display_name(Path::new("/elsewhere/notes.md"), Some(&root)),
            "notes.md"
        );
        assert_eq!(display_name(Path::new("/tmp/a.txt"), None), "a.txt");
    }
}
