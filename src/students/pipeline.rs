//! Listing pipeline: filter → sort → paginate, plus the statistics shared
//! by the list endpoint and the chart endpoint.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::students::bands::StatsBand;
use crate::students::error::StudentError;
use crate::students::query::{AppliedQuery, FilterSpec, ListingQuery, SortField, SortSpec};
use crate::students::repo::StudentStore;
use crate::students::repo_types::Student;

pub const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_count: u64,
    pub page_size: u64,
}

/// Slices one page out of an ordered sequence. Pages past the end clamp to
/// the last page; an empty sequence has a single empty page.
pub fn paginate<T>(items: Vec<T>, page: u64, page_size: u64) -> Page<T> {
    let page_size = page_size.max(1);
    let total = items.len() as u64;
    let page_count = total.div_ceil(page_size).max(1);
    let page = page.clamp(1, page_count);
    let start = ((page - 1) * page_size) as usize;
    let items = items
        .into_iter()
        .skip(start)
        .take(page_size as usize)
        .collect();
    Page {
        items,
        total,
        page,
        page_count,
        page_size,
    }
}

/// Total, average GPA and four-band counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub total: u64,
    pub avg_gpa: Option<Decimal>,
    pub excellent: u64,
    pub good: u64,
    pub average: u64,
    pub poor: u64,
}

impl StoreStats {
    pub fn count(&self, band: StatsBand) -> u64 {
        match band {
            StatsBand::Excellent => self.excellent,
            StatsBand::Good => self.good,
            StatsBand::Average => self.average,
            StatsBand::Poor => self.poor,
        }
    }
}

pub fn round_gpa(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Aggregates over any set of students; the stores use it for the
/// whole-store figures too.
pub fn aggregate(students: &[Student]) -> StoreStats {
    let mut stats = StoreStats::default();
    let mut sum = Decimal::ZERO;
    for s in students {
        stats.total += 1;
        sum += s.gpa;
        match s.stats_band() {
            StatsBand::Excellent => stats.excellent += 1,
            StatsBand::Good => stats.good += 1,
            StatsBand::Average => stats.average += 1,
            StatsBand::Poor => stats.poor += 1,
        }
    }
    if stats.total > 0 {
        stats.avg_gpa = Some(round_gpa(sum / Decimal::from(stats.total)));
    }
    stats
}

/// Chart payload: parallel label/value arrays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<&'static str>,
    pub data: Vec<u64>,
}

impl From<&StoreStats> for ChartData {
    fn from(stats: &StoreStats) -> Self {
        Self {
            labels: StatsBand::ALL.iter().map(|b| b.label()).collect(),
            data: StatsBand::ALL.iter().map(|b| stats.count(*b)).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingResult {
    #[serde(flatten)]
    pub page: Page<Student>,
    pub query: AppliedQuery,
    /// Whole-store figures; they do not follow the active filter.
    pub stats: StoreStats,
    pub recently_created: Vec<Student>,
    pub recently_updated: Vec<Student>,
}

#[instrument(
    name = "students.pipeline.list",
    skip(store, query),
    fields(page = query.page, page_size = query.page_size)
)]
pub async fn list_students(
    store: &dyn StudentStore,
    query: ListingQuery,
) -> Result<ListingResult, StudentError> {
    let matched = store.query(&query.filter, query.sort, None).await?;
    let page = paginate(matched, query.page, query.page_size);
    debug!(total = page.total, page = page.page, "listing page built");

    let stats = store.aggregate().await?;
    let recently_created = store
        .query(&FilterSpec::all(), SortSpec::desc(SortField::CreatedAt), Some(RECENT_LIMIT))
        .await?;
    let recently_updated = store
        .query(&FilterSpec::all(), SortSpec::desc(SortField::UpdatedAt), Some(RECENT_LIMIT))
        .await?;

    Ok(ListingResult {
        page,
        query: query.applied(),
        stats,
        recently_created,
        recently_updated,
    })
}

/// Four-band counts over the whole store; filters never apply here.
pub async fn chart_data(store: &dyn StudentStore) -> Result<ChartData, StudentError> {
    let stats = store.aggregate().await?;
    Ok(ChartData::from(&stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::students::memory::MemoryStudentStore;
    use crate::students::query::{ListingParams, DEFAULT_PAGE_SIZE};
    use crate::students::repo_types::StudentDraft;

    fn draft(first: &str, last: &str, gpa: i64) -> StudentDraft {
        StudentDraft {
            first_name: first.into(),
            last_name: last.into(),
            email: format!("{}.{}@school.edu", first.to_lowercase(), last.to_lowercase()),
            phone: None,
            address: None,
            date_of_birth: None,
            enrollment_date: None,
            gpa: Decimal::new(gpa, 2),
        }
    }

    async fn four_band_store() -> MemoryStudentStore {
        let store = MemoryStudentStore::new();
        for (first, gpa) in [("Ava", 390), ("Ben", 320), ("Cal", 250), ("Dee", 100)] {
            store.insert(draft(first, "Smith", gpa)).await.unwrap();
        }
        store
    }

    fn listing(pairs: &[(&str, &str)]) -> ListingQuery {
        let mut p = ListingParams::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "q" => p.q = v,
                "performance" => p.performance = v,
                "sort" => p.sort = v,
                "page" => p.page = v,
                "page_size" => p.page_size = v,
                "min_gpa" => p.min_gpa = v,
                "max_gpa" => p.max_gpa = v,
                other => panic!("unknown param {other}"),
            }
        }
        ListingQuery::parse(&p, DEFAULT_PAGE_SIZE).unwrap()
    }

    fn gpas(items: &[Student]) -> Vec<String> {
        items.iter().map(|s| s.gpa.to_string()).collect()
    }

    #[test]
    fn paginate_clamps_past_the_end() {
        let items: Vec<u32> = (1..=25).collect();
        let p1 = paginate(items.clone(), 1, 10);
        assert_eq!(p1.items.len(), 10);
        assert_eq!(p1.page_count, 3);
        let p3 = paginate(items.clone(), 3, 10);
        assert_eq!(p3.items, vec![21, 22, 23, 24, 25]);
        let p4 = paginate(items, 4, 10);
        assert_eq!(p4.page, 3);
        assert_eq!(p4.items, p3.items);
    }

    #[test]
    fn paginate_empty_has_one_page() {
        let p = paginate(Vec::<u32>::new(), 5, 10);
        assert_eq!(p.page, 1);
        assert_eq!(p.page_count, 1);
        assert_eq!(p.total, 0);
        assert!(p.items.is_empty());
    }

    #[test]
    fn aggregate_of_nothing_has_no_average() {
        let stats = aggregate(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.avg_gpa, None);
        assert_eq!(ChartData::from(&stats).data, vec![0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn aggregate_over_a_subset() {
        let store = four_band_store().await;
        let top = store
            .query(
                &FilterSpec {
                    gpa_min: Some(Decimal::new(300, 2)),
                    ..FilterSpec::all()
                },
                SortSpec::default(),
                None,
            )
            .await
            .unwrap();
        let stats = aggregate(&top);
        assert_eq!(stats.total, 2);
        assert_eq!((stats.excellent, stats.good, stats.average, stats.poor), (1, 1, 0, 0));
        assert_eq!(stats.avg_gpa, Some(Decimal::new(355, 2)));
    }

    #[tokio::test]
    async fn performance_filter_selects_exact_bands() {
        async fn run(store: &MemoryStudentStore, band: &str) -> Vec<Student> {
            let q = listing(&[("performance", band), ("sort", "-gpa")]);
            list_students(store, q).await.unwrap().page.items
        }
        let store = four_band_store().await;
        assert_eq!(gpas(&run(&store, "excellent").await), vec!["3.90"]);
        assert_eq!(gpas(&run(&store, "good").await), vec!["3.20"]);
        assert_eq!(gpas(&run(&store, "needs_improvement").await), vec!["2.50", "1.00"]);
    }

    #[tokio::test]
    async fn chart_counts_one_per_band() {
        let store = four_band_store().await;
        let chart = chart_data(&store).await.unwrap();
        assert_eq!(chart.labels, vec!["Excellent", "Good", "Average", "Poor"]);
        assert_eq!(chart.data, vec![1, 1, 1, 1]);

        let json = serde_json::to_value(&chart).unwrap();
        assert_eq!(json["labels"][3], "Poor");
        assert_eq!(json["data"][0], 1);
    }

    #[tokio::test]
    async fn stats_ignore_the_active_filter() {
        let store = four_band_store().await;
        let result = list_students(&store, listing(&[("performance", "excellent")]))
            .await
            .unwrap();
        assert_eq!(result.page.total, 1);
        assert_eq!(result.stats.total, 4);
        assert_eq!(result.stats.poor, 1);
        // (3.90 + 3.20 + 2.50 + 1.00) / 4 = 2.65
        assert_eq!(result.stats.avg_gpa, Some(Decimal::new(265, 2)));
    }

    #[tokio::test]
    async fn search_sort_and_page_compose() {
        let store = MemoryStudentStore::new();
        for i in 0..25 {
            let last = if i % 2 == 0 { "Even" } else { "Odd" };
            store.insert(draft(&format!("Kid{i:02}"), last, 200 + i)).await.unwrap();
        }
        let q = listing(&[("q", "EVEN"), ("sort", "gpa"), ("page_size", "5"), ("page", "2")]);
        let result = list_students(&store, q).await.unwrap();
        assert_eq!(result.page.total, 13);
        assert_eq!(result.page.page_count, 3);
        let names: Vec<_> = result.page.items.iter().map(|s| s.first_name.as_str()).collect();
        assert_eq!(names, vec!["Kid10", "Kid12", "Kid14", "Kid16", "Kid18"]);
    }

    #[tokio::test]
    async fn twenty_five_records_paginate_into_three_pages() {
        let store = MemoryStudentStore::new();
        for i in 0..25 {
            store.insert(draft(&format!("S{i}"), "Row", 300)).await.unwrap();
        }
        let page = |n: &'static str| listing(&[("page", n), ("sort", "id")]);
        let p1 = list_students(&store, page("1")).await.unwrap().page;
        let p3 = list_students(&store, page("3")).await.unwrap().page;
        let p4 = list_students(&store, page("4")).await.unwrap().page;
        assert_eq!(p1.items.len(), 10);
        assert_eq!(p3.items.len(), 5);
        assert_eq!(p1.page_count, 3);
        assert_eq!(p4.page, 3);
        assert_eq!(p4.items, p3.items);
    }

    #[tokio::test]
    async fn recent_lists_are_capped_and_unfiltered() {
        let store = MemoryStudentStore::new();
        for i in 0..8 {
            store.insert(draft(&format!("N{i}"), "Recent", 300)).await.unwrap();
        }
        let result = list_students(&store, listing(&[("q", "nobody-matches")]))
            .await
            .unwrap();
        assert_eq!(result.page.total, 0);
        assert_eq!(result.recently_created.len(), RECENT_LIMIT);
        assert_eq!(result.recently_updated.len(), RECENT_LIMIT);
        assert_eq!(result.recently_created[0].first_name, "N7");
    }

    #[tokio::test]
    async fn inverted_gpa_bounds_yield_empty_page() {
        let store = four_band_store().await;
        let result = list_students(&store, listing(&[("min_gpa", "3.5"), ("max_gpa", "2.0")]))
            .await
            .unwrap();
        assert_eq!(result.page.total, 0);
        assert_eq!(result.page.page, 1);
    }
}
