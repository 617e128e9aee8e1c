
use crate::types::{ContentType, File, ModuleKind};

/// Build a plain file record for store tests
pub(crate) fn test_file(module_id: i64, section: &str, name: &str) -> File {
    File {
        module_id,
        section_name: section.into(),
        module_name: format!("Module {module_id}"),
        module_kind: ModuleKind::Resource,
        content_filepath: "/".into(),
        content_filename: name.into(),
        content_fileurl: format!("https://campus.example.com/pluginfile/{module_id}/{name}"),
        content_filesize: 100,
        content_timemodified: 10,
        content_type: ContentType::File,
        modified: false,
        deleted: false,
        notified: false,
        saved_to: None,
        time_stamp: 0,
    }
}
