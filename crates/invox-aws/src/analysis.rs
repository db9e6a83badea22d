//! Asynchronous document analysis against AWS Textract.
//!
//! The workflow is start, poll, paginate: a job is started for a document
//! already in S3, polled until it leaves `IN_PROGRESS`, and its result
//! pages are collected through the continuation token. Service block
//! payloads are converted into the engine's typed [`RawBlock`]s; the
//! conversion is pure and covered by tests without any network.

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_textract::Client;
use aws_sdk_textract::types::{
    Block, BlockType, DocumentLocation, EntityType, FeatureType, JobStatus, QueriesConfig, Query,
    RelationshipType, S3Object, SelectionStatus,
};
use tracing::{debug, info, warn};

use invox_core::{
    CellBlock, Document, Geometry, KeyValuePair, QueryAnswer, RawBlock, SignatureBlock, TableBlock,
    TableId, TextLine, TextWord,
};

use crate::error::AnalysisError;

/// Source of analyzed block sets for one stored document.
///
/// The batch pipeline depends on this seam rather than the concrete
/// client, so extraction runs can be driven from recorded block sets.
#[async_trait::async_trait]
pub trait BlockSource: Send + Sync {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Document, AnalysisError>;
}

#[async_trait::async_trait]
impl BlockSource for DocumentAnalyzer {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Document, AnalysisError> {
        self.analyze(bucket, key).await
    }
}

/// One custom question submitted with each analysis job.
#[derive(Debug, Clone)]
pub struct AnalysisQuery {
    pub text: String,
    pub alias: Option<String>,
}

/// Drives Textract analysis jobs for one configured client.
#[derive(Debug, Clone)]
pub struct DocumentAnalyzer {
    client: Client,
    poll_interval: Duration,
    max_wait: Duration,
    queries: Vec<AnalysisQuery>,
}

impl DocumentAnalyzer {
    pub fn new(client: Client, poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            client,
            poll_interval,
            max_wait,
            queries: Vec::new(),
        }
    }

    /// Build from shared AWS configuration.
    pub fn from_config(
        config: &aws_config::SdkConfig,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Self {
        Self::new(Client::new(config), poll_interval, max_wait)
    }

    /// Submit these custom queries with every analysis job.
    pub fn with_queries(mut self, queries: Vec<AnalysisQuery>) -> Self {
        self.queries = queries;
        self
    }

    /// Run the full workflow for one S3 object and return its block set.
    pub async fn analyze(&self, bucket: &str, key: &str) -> Result<Document, AnalysisError> {
        let job_id = self.start_analysis(bucket, key).await?;
        self.poll_until_complete(&job_id).await?;
        let blocks = self.collect_blocks(&job_id).await?;
        Ok(convert_blocks(&blocks))
    }

    /// Start an analysis job with table, form, and signature extraction,
    /// plus custom queries when any are configured.
    pub async fn start_analysis(&self, bucket: &str, key: &str) -> Result<String, AnalysisError> {
        let location = DocumentLocation::builder()
            .s3_object(S3Object::builder().bucket(bucket).name(key).build())
            .build();

        let mut request = self
            .client
            .start_document_analysis()
            .document_location(location)
            .feature_types(FeatureType::Tables)
            .feature_types(FeatureType::Forms)
            .feature_types(FeatureType::Signatures);

        if !self.queries.is_empty() {
            let mut queries_config = QueriesConfig::builder();
            for query in &self.queries {
                let mut builder = Query::builder().text(&query.text);
                if let Some(alias) = &query.alias {
                    builder = builder.alias(alias);
                }
                let query = builder
                    .build()
                    .map_err(|e| AnalysisError::Service(e.to_string()))?;
                queries_config = queries_config.queries(query);
            }
            request = request
                .feature_types(FeatureType::Queries)
                .queries_config(
                    queries_config
                        .build()
                        .map_err(|e| AnalysisError::Service(e.to_string()))?,
                );
        }

        let resp = request
            .send()
            .await
            .map_err(|e| AnalysisError::Start {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: e.to_string(),
            })?;

        let job_id = resp.job_id.ok_or_else(|| AnalysisError::Start {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: "service returned no job id".to_string(),
        })?;

        info!(%job_id, bucket, key, "started analysis job");
        Ok(job_id)
    }

    /// Poll the job until it succeeds, failing on `FAILED` or timeout.
    pub async fn poll_until_complete(&self, job_id: &str) -> Result<(), AnalysisError> {
        let mut waited = Duration::ZERO;

        loop {
            let resp = self
                .client
                .get_document_analysis()
                .job_id(job_id)
                .max_results(1)
                .send()
                .await
                .map_err(|e| AnalysisError::Service(e.to_string()))?;

            match resp.job_status {
                Some(JobStatus::Succeeded) => return Ok(()),
                Some(JobStatus::PartialSuccess) => {
                    warn!(%job_id, "analysis finished with partial success");
                    return Ok(());
                }
                Some(JobStatus::Failed) => {
                    return Err(AnalysisError::JobFailed {
                        job_id: job_id.to_string(),
                        message: resp
                            .status_message
                            .unwrap_or_else(|| "no status message".to_string()),
                    });
                }
                _ => {}
            }

            if waited >= self.max_wait {
                return Err(AnalysisError::Timeout {
                    job_id: job_id.to_string(),
                    waited_secs: waited.as_secs(),
                });
            }
            debug!(%job_id, waited_secs = waited.as_secs(), "analysis in progress");
            tokio::time::sleep(self.poll_interval).await;
            waited += self.poll_interval;
        }
    }

    /// Collect every result page of a finished job.
    pub async fn collect_blocks(&self, job_id: &str) -> Result<Vec<Block>, AnalysisError> {
        let mut blocks = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let resp = self
                .client
                .get_document_analysis()
                .job_id(job_id)
                .set_next_token(token)
                .send()
                .await
                .map_err(|e| AnalysisError::Service(e.to_string()))?;

            if let Some(page) = resp.blocks {
                blocks.extend(page);
            }
            match resp.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        debug!(%job_id, count = blocks.len(), "collected analysis blocks");
        Ok(blocks)
    }
}

/// Convert raw service blocks into the engine's typed block set.
///
/// Lines and words carry their own text; form keys, values, and table
/// cells assemble theirs from child words. Tables get a synthetic id in
/// encounter order since the engine never sees service UUIDs.
pub fn convert_blocks(blocks: &[Block]) -> Document {
    let by_id: HashMap<&str, &Block> = blocks
        .iter()
        .filter_map(|b| b.id.as_deref().map(|id| (id, b)))
        .collect();

    let mut out = Vec::new();
    let mut next_table = 0u32;

    for block in blocks {
        match block.block_type {
            Some(BlockType::Line) => {
                out.push(RawBlock::Line(TextLine {
                    text: block.text.clone().unwrap_or_default(),
                    geometry: geometry_of(block),
                    confidence: block.confidence.unwrap_or(0.0),
                }));
            }
            Some(BlockType::Word) => {
                out.push(RawBlock::Word(TextWord {
                    text: block.text.clone().unwrap_or_default(),
                    geometry: geometry_of(block),
                    confidence: block.confidence.unwrap_or(0.0),
                }));
            }
            Some(BlockType::KeyValueSet) => {
                if !has_entity(block, EntityType::Key) {
                    continue;
                }
                let key = assembled_text(block, &by_id);
                let value = value_block(block, &by_id)
                    .map(|v| assembled_text(v, &by_id))
                    .unwrap_or_default();
                out.push(RawBlock::KeyValue(KeyValuePair {
                    key,
                    value,
                    geometry: geometry_of(block),
                    confidence: block.confidence.unwrap_or(0.0),
                }));
            }
            Some(BlockType::Table) => {
                next_table += 1;
                let id = TableId(next_table);
                out.push(RawBlock::Table(TableBlock {
                    id,
                    geometry: geometry_of(block),
                    confidence: block.confidence.unwrap_or(0.0),
                }));

                for cell_id in related_ids(block, RelationshipType::Child) {
                    let Some(cell) = by_id.get(cell_id.as_str()) else {
                        continue;
                    };
                    if cell.block_type != Some(BlockType::Cell) {
                        continue;
                    }
                    // Grid indices are 1-based; drop cells without a
                    // usable position rather than fabricating one.
                    let (Some(row), Some(column)) = (cell.row_index, cell.column_index) else {
                        continue;
                    };
                    if row < 1 || column < 1 {
                        continue;
                    }
                    out.push(RawBlock::Cell(CellBlock {
                        table: id,
                        row: row as u32,
                        column: column as u32,
                        text: assembled_text(cell, &by_id),
                        geometry: geometry_of(cell),
                        confidence: cell.confidence.unwrap_or(0.0),
                    }));
                }
            }
            Some(BlockType::Signature) => {
                out.push(RawBlock::Signature(SignatureBlock {
                    geometry: geometry_of(block),
                    confidence: block.confidence.unwrap_or(0.0),
                }));
            }
            Some(BlockType::Query) => {
                let (question, alias) = block
                    .query
                    .as_ref()
                    .map(|q| (q.text.clone(), q.alias.clone().unwrap_or_default()))
                    .unwrap_or_default();
                let answer = related_ids(block, RelationshipType::Answer)
                    .into_iter()
                    .filter_map(|id| by_id.get(id.as_str()).copied())
                    .filter(|b| b.block_type == Some(BlockType::QueryResult))
                    .max_by(|a, b| {
                        a.confidence
                            .unwrap_or(0.0)
                            .total_cmp(&b.confidence.unwrap_or(0.0))
                    });
                out.push(RawBlock::Query(QueryAnswer {
                    question,
                    alias,
                    answer: answer.and_then(|b| b.text.clone()).unwrap_or_default(),
                    geometry: answer.map(geometry_of).unwrap_or_else(|| geometry_of(block)),
                    confidence: answer.and_then(|b| b.confidence).unwrap_or(0.0),
                }));
            }
            _ => {}
        }
    }

    Document::new(out)
}

fn geometry_of(block: &Block) -> Geometry {
    let page = block.page.unwrap_or(1).max(1) as u32;
    let bbox = block
        .geometry
        .as_ref()
        .and_then(|g| g.bounding_box.as_ref());
    match bbox {
        Some(b) => Geometry {
            page,
            left: b.left,
            top: b.top,
            width: b.width,
            height: b.height,
        },
        None => Geometry {
            page,
            ..Geometry::default()
        },
    }
}

fn has_entity(block: &Block, entity: EntityType) -> bool {
    block
        .entity_types
        .as_deref()
        .is_some_and(|types| types.contains(&entity))
}

fn related_ids(block: &Block, relation: RelationshipType) -> Vec<String> {
    block
        .relationships
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter(|r| r.r#type.as_ref() == Some(&relation))
        .flat_map(|r| r.ids.clone().unwrap_or_default())
        .collect()
}

fn value_block<'a>(key: &Block, by_id: &HashMap<&str, &'a Block>) -> Option<&'a Block> {
    related_ids(key, RelationshipType::Value)
        .into_iter()
        .find_map(|id| by_id.get(id.as_str()).copied())
}

/// Join a block's child words into one string. Selected checkboxes read
/// as "X", matching how the service renders selection elements.
fn assembled_text(block: &Block, by_id: &HashMap<&str, &Block>) -> String {
    let mut parts = Vec::new();
    for id in related_ids(block, RelationshipType::Child) {
        let Some(child) = by_id.get(id.as_str()) else {
            continue;
        };
        match child.block_type {
            Some(BlockType::Word) => {
                if let Some(text) = child.text.as_deref() {
                    parts.push(text.to_string());
                }
            }
            Some(BlockType::SelectionElement) => {
                if child.selection_status == Some(SelectionStatus::Selected) {
                    parts.push("X".to_string());
                }
            }
            _ => {}
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use aws_sdk_textract::types::{BoundingBox, Geometry as AwsGeometry, Relationship};
    use pretty_assertions::assert_eq;

    use super::*;

    fn bbox(left: f32, top: f32) -> AwsGeometry {
        AwsGeometry::builder()
            .bounding_box(
                BoundingBox::builder()
                    .left(left)
                    .top(top)
                    .width(0.2)
                    .height(0.02)
                    .build(),
            )
            .build()
    }

    fn word(id: &str, text: &str) -> Block {
        Block::builder()
            .block_type(BlockType::Word)
            .id(id)
            .text(text)
            .confidence(99.0)
            .page(1)
            .geometry(bbox(0.1, 0.1))
            .build()
    }

    fn children(ids: &[&str]) -> Relationship {
        let mut builder = Relationship::builder().r#type(RelationshipType::Child);
        for id in ids {
            builder = builder.ids(id.to_string());
        }
        builder.build()
    }

    #[test]
    fn lines_convert_with_geometry_and_page() {
        let blocks = vec![
            Block::builder()
                .block_type(BlockType::Line)
                .id("l1")
                .text("Total $93.50")
                .confidence(98.5)
                .page(2)
                .geometry(bbox(0.3, 0.7))
                .build(),
        ];

        let doc = convert_blocks(&blocks);
        let lines = doc.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Total $93.50");
        assert_eq!(lines[0].geometry.page, 2);
        assert_eq!(lines[0].geometry.left, 0.3);
        assert_eq!(lines[0].confidence, 98.5);
    }

    #[test]
    fn key_value_sets_pair_key_with_value_text() {
        let blocks = vec![
            Block::builder()
                .block_type(BlockType::KeyValueSet)
                .entity_types(EntityType::Key)
                .id("k1")
                .confidence(95.0)
                .page(1)
                .geometry(bbox(0.1, 0.2))
                .relationships(children(&["w1", "w2"]))
                .relationships(
                    Relationship::builder()
                        .r#type(RelationshipType::Value)
                        .ids("v1")
                        .build(),
                )
                .build(),
            Block::builder()
                .block_type(BlockType::KeyValueSet)
                .entity_types(EntityType::Value)
                .id("v1")
                .confidence(94.0)
                .page(1)
                .relationships(children(&["w3"]))
                .build(),
            word("w1", "Invoice"),
            word("w2", "Number:"),
            word("w3", "INV-3337"),
        ];

        let doc = convert_blocks(&blocks);
        let kvs = doc.key_values();
        assert_eq!(kvs.len(), 1);
        assert_eq!(kvs[0].key, "Invoice Number:");
        assert_eq!(kvs[0].value, "INV-3337");
    }

    #[test]
    fn tables_get_synthetic_ids_and_typed_cells() {
        let blocks = vec![
            Block::builder()
                .block_type(BlockType::Table)
                .id("t1")
                .confidence(90.0)
                .page(1)
                .geometry(bbox(0.1, 0.3))
                .relationships(children(&["c1", "c2"]))
                .build(),
            Block::builder()
                .block_type(BlockType::Cell)
                .id("c1")
                .row_index(1)
                .column_index(1)
                .confidence(92.0)
                .page(1)
                .geometry(bbox(0.1, 0.35))
                .relationships(children(&["w1"]))
                .build(),
            Block::builder()
                .block_type(BlockType::Cell)
                .id("c2")
                .row_index(1)
                .column_index(2)
                .confidence(91.0)
                .page(1)
                .geometry(bbox(0.3, 0.35))
                .relationships(children(&["w2"]))
                .build(),
            word("w1", "Description"),
            word("w2", "Amount"),
        ];

        let doc = convert_blocks(&blocks);
        let tables = doc.tables();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].id, TableId(1));
        assert_eq!(tables[0].rows().len(), 1);
        assert_eq!(tables[0].rows()[0][0].text, "Description");
        assert_eq!(tables[0].rows()[0][1].text, "Amount");
    }

    #[test]
    fn cells_without_grid_position_are_dropped() {
        let blocks = vec![
            Block::builder()
                .block_type(BlockType::Table)
                .id("t1")
                .confidence(90.0)
                .page(1)
                .geometry(bbox(0.1, 0.3))
                .relationships(children(&["c1", "c2", "c3"]))
                .build(),
            // No indices at all.
            Block::builder()
                .block_type(BlockType::Cell)
                .id("c1")
                .confidence(92.0)
                .page(1)
                .relationships(children(&["w1"]))
                .build(),
            // Zero is outside the 1-based grid.
            Block::builder()
                .block_type(BlockType::Cell)
                .id("c2")
                .row_index(0)
                .column_index(1)
                .confidence(92.0)
                .page(1)
                .relationships(children(&["w1"]))
                .build(),
            Block::builder()
                .block_type(BlockType::Cell)
                .id("c3")
                .row_index(1)
                .column_index(1)
                .confidence(92.0)
                .page(1)
                .relationships(children(&["w2"]))
                .build(),
            word("w1", "ghost"),
            word("w2", "kept"),
        ];

        let doc = convert_blocks(&blocks);
        let tables = doc.tables();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows().len(), 1);
        assert_eq!(tables[0].rows()[0].len(), 1);
        assert_eq!(tables[0].rows()[0][0].text, "kept");
    }

    #[test]
    fn signature_blocks_convert() {
        let blocks = vec![
            Block::builder()
                .block_type(BlockType::Signature)
                .id("s1")
                .confidence(88.0)
                .page(2)
                .geometry(bbox(0.6, 0.9))
                .build(),
        ];

        let doc = convert_blocks(&blocks);
        let signatures = doc.signatures();
        assert_eq!(signatures.len(), 1);
        assert_eq!(signatures[0].geometry.page, 2);
        assert_eq!(signatures[0].confidence, 88.0);
    }

    #[test]
    fn query_blocks_pair_with_their_best_answer() {
        let blocks = vec![
            Block::builder()
                .block_type(BlockType::Query)
                .id("q1")
                .page(1)
                .query(
                    Query::builder()
                        .text("What is the invoice number?")
                        .alias("INVOICE_NUMBER")
                        .build()
                        .unwrap(),
                )
                .relationships(
                    Relationship::builder()
                        .r#type(RelationshipType::Answer)
                        .ids("a1")
                        .ids("a2")
                        .build(),
                )
                .build(),
            Block::builder()
                .block_type(BlockType::QueryResult)
                .id("a1")
                .text("INV-0001")
                .confidence(61.0)
                .page(1)
                .geometry(bbox(0.2, 0.1))
                .build(),
            Block::builder()
                .block_type(BlockType::QueryResult)
                .id("a2")
                .text("INV-3337")
                .confidence(97.0)
                .page(1)
                .geometry(bbox(0.7, 0.1))
                .build(),
        ];

        let doc = convert_blocks(&blocks);
        let queries = doc.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].question, "What is the invoice number?");
        assert_eq!(queries[0].alias, "INVOICE_NUMBER");
        assert_eq!(queries[0].answer, "INV-3337");
        assert_eq!(queries[0].confidence, 97.0);
        assert_eq!(queries[0].geometry.left, 0.7);
    }

    #[test]
    fn unanswered_queries_convert_with_empty_answer() {
        let blocks = vec![
            Block::builder()
                .block_type(BlockType::Query)
                .id("q1")
                .page(1)
                .query(
                    Query::builder()
                        .text("What is the payment terms?")
                        .build()
                        .unwrap(),
                )
                .build(),
        ];

        let doc = convert_blocks(&blocks);
        let queries = doc.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].answer, "");
        assert_eq!(queries[0].confidence, 0.0);
    }

    #[test]
    fn selected_checkboxes_read_as_x() {
        let blocks = vec![
            Block::builder()
                .block_type(BlockType::KeyValueSet)
                .entity_types(EntityType::Key)
                .id("k1")
                .page(1)
                .relationships(children(&["w1"]))
                .relationships(
                    Relationship::builder()
                        .r#type(RelationshipType::Value)
                        .ids("v1")
                        .build(),
                )
                .build(),
            Block::builder()
                .block_type(BlockType::KeyValueSet)
                .entity_types(EntityType::Value)
                .id("v1")
                .page(1)
                .relationships(children(&["s1"]))
                .build(),
            word("w1", "Paid"),
            Block::builder()
                .block_type(BlockType::SelectionElement)
                .id("s1")
                .selection_status(SelectionStatus::Selected)
                .page(1)
                .build(),
        ];

        let doc = convert_blocks(&blocks);
        assert_eq!(doc.key_values()[0].value, "X");
    }

    #[test]
    fn missing_page_defaults_to_one() {
        let blocks = vec![
            Block::builder()
                .block_type(BlockType::Line)
                .id("l1")
                .text("header")
                .confidence(99.0)
                .build(),
        ];

        let doc = convert_blocks(&blocks);
        assert_eq!(doc.lines()[0].geometry.page, 1);
    }

    #[test]
    fn unhandled_block_types_are_dropped() {
        let blocks = vec![
            Block::builder().block_type(BlockType::Page).id("p1").build(),
        ];
        assert!(convert_blocks(&blocks).is_empty());
    }
}
