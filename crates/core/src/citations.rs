use crate::agents::AgentCallbacks;
use crate::frontend::{OutgoingMessage, PdfElement};
use crate::models::{Citation, RetrievedChunk};
use std::collections::BTreeSet;

pub const SOURCES_HEADER: &str = "\n\n**Sources:**\n";
pub const ELEMENT_DISPLAY: &str = "side";

/// Collects the (source, page) pairs retrieval returned and attaches them
/// to the answer once generation ends.
#[derive(Debug, Default)]
pub struct SourceCollector {
    sources: BTreeSet<Citation>,
}

impl SourceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn citations(&self) -> impl Iterator<Item = &Citation> {
        self.sources.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn render(&self) -> String {
        let lines: Vec<String> = self.sources.iter().map(Citation::label).collect();
        format!("{SOURCES_HEADER}{}", lines.join("\n"))
    }

    pub fn elements(&self) -> Vec<PdfElement> {
        self.sources
            .iter()
            .map(|citation| PdfElement {
                name: citation.label(),
                path: citation.path.clone(),
                page: citation.page,
                display: ELEMENT_DISPLAY.to_string(),
            })
            .collect()
    }
}

impl AgentCallbacks for SourceCollector {
    fn on_retriever_end(&mut self, documents: &[RetrievedChunk]) {
        for document in documents {
            self.sources.insert(Citation::from_chunk(&document.chunk));
        }
    }

    fn on_llm_end(&mut self, message: &mut OutgoingMessage) {
        if self.sources.is_empty() {
            return;
        }
        message.content.push_str(&self.render());
        message.elements.extend(self.elements());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn hit(path: &str, page: u32, index: u64) -> RetrievedChunk {
        RetrievedChunk {
            chunk: Chunk {
                chunk_id: format!("{path}-{page}-{index}"),
                content: "text".to_string(),
                source_path: path.to_string(),
                page_number: page,
                chunk_index: index,
            },
            score: 0.9,
        }
    }

    #[test]
    fn duplicate_pages_are_cited_once() {
        let mut collector = SourceCollector::new();
        collector.on_retriever_end(&[
            hit("/data/s1/report.pdf", 2, 0),
            hit("/data/s1/report.pdf", 2, 1),
            hit("/data/s1/report.pdf", 5, 2),
        ]);

        let mut message = OutgoingMessage::new("Answer.");
        collector.on_llm_end(&mut message);

        assert_eq!(
            message.content,
            "Answer.\n\n**Sources:**\nreport.pdf, page 2\nreport.pdf, page 5"
        );
        let names: Vec<&str> = message.elements.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["report.pdf, page 2", "report.pdf, page 5"]);
        assert_eq!(message.elements[0].display, "side");
        assert_eq!(message.elements[1].page, 5);
    }

    #[test]
    fn nothing_is_appended_without_sources() {
        let mut collector = SourceCollector::new();
        collector.on_retriever_end(&[]);

        let mut message = OutgoingMessage::new("Answer.");
        collector.on_llm_end(&mut message);

        assert_eq!(message.content, "Answer.");
        assert!(message.elements.is_empty());
    }
}
