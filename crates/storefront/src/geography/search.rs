//! In-memory Tantivy index over governorate and city names.

use serde::Serialize;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, FuzzyTermQuery, Occur, Query, RegexQuery, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing, TextOptions, Value,
};
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term, doc};
use tracing::instrument;

use stride_core::Money;

use super::normalize::{normalize, terms};
use super::{GeographyError, Governorate};

/// Tokenizer registered for the search field.
const TOKENIZER: &str = "place_name";

/// Terms shorter than this match by prefix only.
const FUZZY_MIN_CHARS: usize = 3;

/// What a search hit refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Governorate,
    City,
}

impl MatchKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Governorate => "governorate",
            Self::City => "city",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "governorate" => Some(Self::Governorate),
            "city" => Some(Self::City),
            _ => None,
        }
    }
}

/// A search hit with everything the checkout form needs to fill itself in.
#[derive(Debug, Clone, Serialize)]
pub struct AddressMatch {
    pub kind: MatchKind,
    pub governorate_id: String,
    pub governorate_en: String,
    pub governorate_ar: String,
    pub city_en: Option<String>,
    pub city_ar: Option<String>,
    pub shipping_cost: Money,
    pub score: f32,
}

#[derive(Clone, Copy)]
struct AddressFields {
    kind: Field,
    governorate_id: Field,
    city_index: Field,
    names: Field,
}

/// Search index over the dataset. Built once at startup.
pub struct AddressIndex {
    reader: IndexReader,
    fields: AddressFields,
}

impl AddressIndex {
    fn build_schema() -> (Schema, AddressFields) {
        let mut schema_builder = Schema::builder();

        let kind = schema_builder.add_text_field("kind", STRING | STORED);
        let governorate_id = schema_builder.add_text_field("governorate_id", STRING | STORED);
        let city_index = schema_builder.add_u64_field("city_index", STORED);

        let indexing = TextFieldIndexing::default()
            .set_tokenizer(TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let names = schema_builder
            .add_text_field("names", TextOptions::default().set_indexing_options(indexing));

        let fields = AddressFields {
            kind,
            governorate_id,
            city_index,
            names,
        };
        (schema_builder.build(), fields)
    }

    /// Index every governorate and city.
    ///
    /// City documents also carry their governorate's names, so "nasr cairo"
    /// ranks Nasr City above other Cairo cities.
    ///
    /// # Errors
    ///
    /// Returns an error if Tantivy fails to build the index.
    pub fn build(governorates: &[Governorate]) -> Result<Self, GeographyError> {
        let (schema, fields) = Self::build_schema();
        let index = Index::create_in_ram(schema);
        index.tokenizers().register(
            TOKENIZER,
            TextAnalyzer::builder(SimpleTokenizer::default())
                .filter(RemoveLongFilter::limit(40))
                .filter(LowerCaser)
                .build(),
        );

        let mut writer: IndexWriter = index
            .writer_with_num_threads(1, 15_000_000)
            .map_err(|e| GeographyError::Index(format!("Failed to create writer: {e}")))?;

        for governorate in governorates {
            let governorate_names = format!(
                "{} {}",
                normalize(&governorate.name_en),
                normalize(&governorate.name_ar)
            );
            writer
                .add_document(doc!(
                    fields.kind => MatchKind::Governorate.as_str(),
                    fields.governorate_id => governorate.id.as_str(),
                    fields.names => governorate_names.as_str(),
                ))
                .map_err(|e| GeographyError::Index(format!("Failed to add document: {e}")))?;

            for (position, city) in governorate.cities.iter().enumerate() {
                let names = format!(
                    "{} {} {governorate_names}",
                    normalize(&city.name_en),
                    normalize(&city.name_ar)
                );
                writer
                    .add_document(doc!(
                        fields.kind => MatchKind::City.as_str(),
                        fields.governorate_id => governorate.id.as_str(),
                        fields.city_index => position as u64,
                        fields.names => names.as_str(),
                    ))
                    .map_err(|e| GeographyError::Index(format!("Failed to add document: {e}")))?;
            }
        }

        writer
            .commit()
            .map_err(|e| GeographyError::Index(format!("Failed to commit: {e}")))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| GeographyError::Index(format!("Failed to create reader: {e}")))?;

        Ok(Self { reader, fields })
    }

    /// Build the query for a normalized search string.
    ///
    /// Short terms match as prefixes. Longer terms match exactly (boosted),
    /// or as a prefix within one edit.
    fn build_query(&self, normalized: &str) -> Result<Box<dyn Query>, GeographyError> {
        let mut subqueries: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        for term in terms(normalized) {
            if term.chars().count() < FUZZY_MIN_CHARS {
                let pattern = format!("{}.*", regex::escape(term));
                let prefix = RegexQuery::from_pattern(&pattern, self.fields.names)
                    .map_err(|e| GeographyError::Query(format!("Invalid prefix '{term}': {e}")))?;
                subqueries.push((Occur::Should, Box::new(prefix)));
                continue;
            }

            let exact = Term::from_field_text(self.fields.names, term);
            subqueries.push((
                Occur::Should,
                Box::new(BoostQuery::new(
                    Box::new(TermQuery::new(exact.clone(), IndexRecordOption::WithFreqs)),
                    2.0,
                )),
            ));
            subqueries.push((
                Occur::Should,
                Box::new(FuzzyTermQuery::new_prefix(exact, 1, true)),
            ));
        }

        Ok(Box::new(BooleanQuery::new(subqueries)))
    }

    /// Search for places matching `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    #[instrument(skip(self, governorates))]
    pub fn search(
        &self,
        governorates: &[Governorate],
        query: &str,
        limit: usize,
    ) -> Result<Vec<AddressMatch>, GeographyError> {
        let normalized = normalize(query);
        if normalized.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let query = self.build_query(&normalized)?;
        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(|e| GeographyError::Query(format!("Search failed: {e}")))?;

        let mut matches = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc = searcher
                .doc::<TantivyDocument>(address)
                .map_err(|e| GeographyError::Query(format!("Failed to retrieve doc: {e}")))?;
            if let Some(found) = self.resolve(governorates, &doc, score) {
                matches.push(found);
            }
        }
        Ok(matches)
    }

    /// Turn a stored document back into dataset entries.
    fn resolve(
        &self,
        governorates: &[Governorate],
        doc: &TantivyDocument,
        score: f32,
    ) -> Option<AddressMatch> {
        let kind = doc
            .get_first(self.fields.kind)
            .and_then(|v| v.as_str())
            .and_then(MatchKind::parse)?;
        let governorate_id = doc
            .get_first(self.fields.governorate_id)
            .and_then(|v| v.as_str())?;
        let governorate = governorates.iter().find(|g| g.id == governorate_id)?;

        let city = match kind {
            MatchKind::Governorate => None,
            MatchKind::City => {
                let position = doc
                    .get_first(self.fields.city_index)
                    .and_then(|v| v.as_u64())?;
                Some(governorate.cities.get(usize::try_from(position).ok()?)?)
            }
        };

        Some(AddressMatch {
            kind,
            governorate_id: governorate.id.clone(),
            governorate_en: governorate.name_en.clone(),
            governorate_ar: governorate.name_ar.clone(),
            city_en: city.map(|c| c.name_en.clone()),
            city_ar: city.map(|c| c.name_ar.clone()),
            shipping_cost: governorate.shipping_cost,
            score,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::geography::{Geography, MatchKind};

    fn geography() -> Geography {
        Geography::egypt().unwrap()
    }

    #[test]
    fn test_arabic_query_ignores_article_and_taa_marbuta() {
        let results = geography().search("قاهره", 5).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].governorate_id, "cairo");
    }

    #[test]
    fn test_hamza_variant_finds_alexandria() {
        let results = geography().search("اسكندرية", 5).unwrap();
        assert!(results.iter().any(|r| r.governorate_id == "alexandria"));
    }

    #[test]
    fn test_english_typo_tolerated() {
        let results = geography().search("Alexandrai", 5).unwrap();
        assert!(results.iter().any(|r| r.governorate_id == "alexandria"));
    }

    #[test]
    fn test_short_prefix() {
        let results = geography().search("Lu", 10).unwrap();
        assert!(results.iter().any(|r| r.governorate_id == "luxor"));
    }

    #[test]
    fn test_city_hit_carries_governorate_cost() {
        let geography = geography();
        let results = geography.search("Hurghada", 5).unwrap();
        let hit = results
            .iter()
            .find(|r| r.kind == MatchKind::City)
            .unwrap();
        assert_eq!(hit.city_en.as_deref(), Some("Hurghada"));
        assert_eq!(hit.governorate_id, "red-sea");
        assert_eq!(Some(hit.shipping_cost), geography.shipping_cost("red-sea"));
    }

    #[test]
    fn test_blank_query() {
        assert!(geography().search("   ", 5).unwrap().is_empty());
        assert!(geography().search("ـــ", 5).unwrap().is_empty());
    }
}
