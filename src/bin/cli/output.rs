//! Output formatting for CLI operations.

use arcflow::progress::{format_bytes_iec, format_duration};
use arcflow::{ArchiveTreeItem, ArchiveTreeNode, ArchiveTreeRoot, ArchiveType, OperationResult};
use serde_json::{Value, json};

use crate::OutputFormat;

/// Trait for output formatting
pub trait OutputFormatter {
    /// Formats an archive tree
    fn format_list(&self, root: &ArchiveTreeRoot) -> String;

    /// Formats the result of a compress or extract run
    fn format_result(&self, result: &OperationResult) -> String;

    /// Formats the supported archive types
    fn format_types(&self) -> String;
}

/// Creates the formatter for `format`.
pub fn create_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Human => Box::new(HumanFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Human-readable output formatter
pub struct HumanFormatter;

impl HumanFormatter {
    fn push_node(output: &mut String, node: &ArchiveTreeNode, depth: usize) {
        for child in node.children() {
            let indent = "  ".repeat(depth);
            match child {
                ArchiveTreeItem::Node(folder) => {
                    output.push_str(&format!("{:>12} {}{}/\n", "", indent, folder.name()));
                    Self::push_node(output, folder, depth + 1);
                }
                ArchiveTreeItem::File(entry) => {
                    let marker = if entry.is_archive { " [archive]" } else { "" };
                    output.push_str(&format!(
                        "{:>12} {}{}{}\n",
                        format_bytes_iec(entry.size),
                        indent,
                        entry.name,
                        marker
                    ));
                }
            }
        }
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_list(&self, root: &ArchiveTreeRoot) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{} ({})\n",
            root.archive().display(),
            root.archive_type().name()
        ));
        output.push_str(&"-".repeat(70));
        output.push('\n');

        Self::push_node(&mut output, root.node(), 0);

        let file_count = root.node().walk().len();
        let key_count = root.node().keys().len();
        output.push_str(&"-".repeat(70));
        output.push('\n');
        output.push_str(&format!(
            "{} files, {} folders, {} total\n",
            file_count,
            key_count - file_count,
            format_bytes_iec(root.total_size())
        ));

        output
    }

    fn format_result(&self, result: &OperationResult) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{} in {}\n",
            result.message,
            format_duration(result.elapsed)
        ));
        for name in &result.archive_names {
            output.push_str(&format!("  created {name}\n"));
        }
        if let Some(verbose) = &result.verbose_message {
            output.push_str("\nFailures:\n");
            for line in verbose.lines() {
                output.push_str(&format!("  {line}\n"));
            }
        }

        output
    }

    fn format_types(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("{:<12} {:<10} {}\n", "Type", "Compress", "Extensions"));
        output.push_str(&"-".repeat(50));
        output.push('\n');
        for archive_type in ArchiveType::all() {
            output.push_str(&format!(
                "{:<12} {:<10} {}\n",
                archive_type.name(),
                if archive_type.supports_compression() { "yes" } else { "no" },
                archive_type.registered_extensions().join(", ")
            ));
        }
        output
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl JsonFormatter {
    fn node_json(node: &ArchiveTreeNode) -> Vec<Value> {
        node.children()
            .iter()
            .map(|child| match child {
                ArchiveTreeItem::Node(folder) => json!({
                    "key": folder.id(),
                    "name": folder.name(),
                    "is_directory": true,
                    "children": Self::node_json(folder),
                }),
                ArchiveTreeItem::File(entry) => json!({
                    "key": entry.key,
                    "name": entry.name,
                    "is_directory": false,
                    "size": entry.size,
                    "is_archive": entry.is_archive,
                }),
            })
            .collect()
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_list(&self, root: &ArchiveTreeRoot) -> String {
        let obj = json!({
            "archive": root.archive().display().to_string(),
            "type": root.archive_type().name(),
            "total_size": root.total_size(),
            "entries": Self::node_json(root.node()),
        });
        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_result(&self, result: &OperationResult) -> String {
        let obj = json!({
            "status": result.status.as_str(),
            "message": result.message,
            "verbose_message": result.verbose_message,
            "elapsed_ms": result.elapsed.as_millis() as u64,
            "archive_names": result.archive_names,
        });
        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string()) + "\n"
    }

    fn format_types(&self) -> String {
        let items: Vec<_> = ArchiveType::all()
            .iter()
            .map(|t| {
                json!({
                    "name": t.name(),
                    "compress": t.supports_compression(),
                    "extensions": t.registered_extensions(),
                })
            })
            .collect();
        serde_json::to_string_pretty(&items).unwrap_or_else(|_| "[]".to_string()) + "\n"
    }
}
