//! DirectoryCatalog - アイテムファイルのディレクトリをカタログとして扱う
//!
//! 貸出可能なのは `root` 直下の通常ファイル。貸出でファイルを `root/.lent/` へ移し、
//! 返却で元に戻す。

use std::path::{Path, PathBuf};

use tracing::info;

use crate::domain::{CatalogError, ItemId};
use crate::ports::Catalog;

const LENT_DIR: &str = ".lent";

#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn lent_dir(&self) -> PathBuf {
        self.root.join(LENT_DIR)
    }

    /// Item ids are bare file names; anything that could escape `root` is rejected.
    fn file_name<'a>(&self, item: &'a ItemId) -> Result<&'a str, CatalogError> {
        let name = item.as_str();
        let invalid = name.is_empty()
            || name.starts_with('.')
            || name.contains('/')
            || name.contains('\\');
        if invalid {
            return Err(CatalogError::InvalidItem(name.to_string()));
        }
        Ok(name)
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CatalogError + '_ {
    move |source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl Catalog for DirectoryCatalog {
    fn list_items(&self) -> Result<Vec<ItemId>, CatalogError> {
        let entries = std::fs::read_dir(&self.root).map_err(io_error(&self.root))?;

        let mut items = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_error(&self.root))?;
            let is_file = entry
                .file_type()
                .map_err(io_error(&entry.path()))?
                .is_file();
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if is_file && !name.starts_with('.') {
                items.push(ItemId::new(name));
            }
        }
        items.sort();
        Ok(items)
    }

    fn contains(&self, item: &ItemId) -> Result<bool, CatalogError> {
        let name = self.file_name(item)?;
        Ok(self.root.join(name).is_file())
    }

    fn remove(&self, item: &ItemId) -> Result<PathBuf, CatalogError> {
        let name = self.file_name(item)?;
        let from = self.root.join(name);
        if !from.is_file() {
            return Err(CatalogError::NotFound(item.clone()));
        }

        let lent_dir = self.lent_dir();
        std::fs::create_dir_all(&lent_dir).map_err(io_error(&lent_dir))?;

        let to = lent_dir.join(name);
        std::fs::rename(&from, &to).map_err(io_error(&from))?;
        info!(item_id = %item, "item checked out of catalog");
        Ok(to)
    }

    fn restore(&self, item: &ItemId) -> Result<(), CatalogError> {
        let name = self.file_name(item)?;
        let from = self.lent_dir().join(name);
        if !from.is_file() {
            return Err(CatalogError::NotLent(item.clone()));
        }

        let to = self.root.join(name);
        std::fs::rename(&from, &to).map_err(io_error(&from))?;
        info!(item_id = %item, "item restored to catalog");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_with(files: &[&str]) -> (tempfile::TempDir, DirectoryCatalog) {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            std::fs::write(dir.path().join(file), b"%PDF-1.4").unwrap();
        }
        let catalog = DirectoryCatalog::new(dir.path());
        (dir, catalog)
    }

    #[test]
    fn lists_visible_files_sorted() {
        let (dir, catalog) = catalog_with(&["b.pdf", "a.pdf", ".hidden"]);
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        let items = catalog.list_items().unwrap();
        assert_eq!(items, vec![ItemId::new("a.pdf"), ItemId::new("b.pdf")]);
    }

    #[test]
    fn checkout_and_return_move_the_file() {
        let (_dir, catalog) = catalog_with(&["a.pdf"]);
        let item = ItemId::new("a.pdf");

        let held = catalog.remove(&item).unwrap();
        assert!(held.is_file());
        assert!(!catalog.contains(&item).unwrap());
        assert!(catalog.list_items().unwrap().is_empty());

        catalog.restore(&item).unwrap();
        assert!(catalog.contains(&item).unwrap());
        assert!(!held.exists());
    }

    #[test]
    fn missing_items_are_reported() {
        let (_dir, catalog) = catalog_with(&[]);
        let item = ItemId::new("ghost.pdf");

        assert!(matches!(
            catalog.remove(&item),
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            catalog.restore(&item),
            Err(CatalogError::NotLent(_))
        ));
    }

    #[test]
    fn path_like_names_are_rejected() {
        let (_dir, catalog) = catalog_with(&[]);
        for bad in ["../etc/passwd", "a/b.pdf", ".lent", ""] {
            assert!(matches!(
                catalog.contains(&ItemId::new(bad)),
                Err(CatalogError::InvalidItem(_))
            ));
        }
    }
}
