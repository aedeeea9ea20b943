//! PDF 目录展开
//!
//! 书签树展开为 `{title, page}` 叶子节点，子层级用嵌套列表保留

use serde::{Deserialize, Serialize};

/// 从 PDF 读取的原始书签
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOutlineItem {
    pub title: Option<String>,
    /// 1 起始页码，无法解析目标页时为 None
    pub page: Option<u32>,
    pub children: Vec<RawOutlineItem>,
}

/// 目录节点，JSON 形态为 `{"title": .., "page": ..}` 或嵌套数组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutlineNode {
    Entry { title: String, page: u32 },
    Nested(Vec<OutlineNode>),
}

/// 展开书签树
///
/// 缺少标题或目标页的条目被跳过，但其子条目仍会保留
pub fn flatten_outline(items: &[RawOutlineItem]) -> Vec<OutlineNode> {
    let mut nodes = Vec::new();

    for item in items {
        match (&item.title, item.page) {
            (Some(title), Some(page)) if !title.trim().is_empty() => {
                nodes.push(OutlineNode::Entry {
                    title: title.trim().to_string(),
                    page,
                });
            }
            _ => {
                tracing::debug!(title = ?item.title, page = ?item.page, "Skipping malformed outline entry");
            }
        }

        if !item.children.is_empty() {
            let children = flatten_outline(&item.children);
            if !children.is_empty() {
                nodes.push(OutlineNode::Nested(children));
            }
        }
    }

    nodes
}
