//! 报告装配：将合并后的各节渲染为最终产物
//!
//! 对核心而言是纯函数：sections + topic → 产物引用；失败按步骤失败处理。

use std::path::PathBuf;

use crate::workflow::error::StepError;
use crate::workflow::types::Section;

/// 产物渲染器
pub trait ArtifactRenderer: Send + Sync {
    /// 装配报告，返回产物引用（文件路径或 URI）
    fn assemble(&self, topic: &str, sections: &[Section]) -> Result<String, StepError>;
}

/// Markdown 渲染器：写入 <output_root>/<topic_safe>_<时间戳>/report.md
pub struct MarkdownRenderer {
    output_root: PathBuf,
}

impl MarkdownRenderer {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self { output_root: output_root.into() }
    }

    fn compose(topic: &str, sections: &[Section]) -> String {
        let mut doc = format!("# {}\n\n## Introduction\n\nThis report gathers {} analyst perspectives on \"{}\".\n", topic, sections.len(), topic);
        for section in sections {
            doc.push_str(&format!("\n## {}\n\n{}\n", section.participant, section.content));
        }
        doc.push_str("\n## Conclusion\n\nCompiled from all completed analyst interviews.\n");
        doc
    }
}

impl ArtifactRenderer for MarkdownRenderer {
    fn assemble(&self, topic: &str, sections: &[Section]) -> Result<String, StepError> {
        let safe_topic: String = topic
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let dir = self.output_root.join(format!("{}_{}", safe_topic, timestamp));

        std::fs::create_dir_all(&dir).map_err(|e| StepError::Render(e.to_string()))?;
        let path = dir.join("report.md");
        std::fs::write(&path, Self::compose(topic, sections))
            .map_err(|e| StepError::Render(e.to_string()))?;

        Ok(path.display().to_string())
    }
}
