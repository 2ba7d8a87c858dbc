//! Plan, template and bulk execution on a unit of work.

use super::{AccessError, AccessResult, FromRow, UnitOfWork};
use crate::model::member::MemberId;
use crate::page::{Page, PageRequest, Slice};
use crate::query::{BoundQuery, BulkPlan, QueryBuilder, QueryPlan, TemplateKind};
use log::{error, info};
use std::time::Instant;

/// Result of a bulk statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Rows changed in the store.
    pub affected: usize,
    /// Cached members now stale, ordered by id.
    pub stale: Vec<MemberId>,
}

impl UnitOfWork<'_> {
    /// Runs `plan` and maps every row into `T`.
    pub fn fetch<T: FromRow>(&mut self, plan: &QueryPlan) -> AccessResult<Vec<T>> {
        self.flush()?;
        self.query(&plan.statement(), plan.shape())
    }

    /// Runs `plan` expecting zero or one row. At most two rows are read.
    pub fn fetch_one<T: FromRow>(&mut self, plan: &QueryPlan) -> AccessResult<Option<T>> {
        self.flush()?;
        let limit = plan.limit().map_or(2, |limit| limit.min(2));
        let statement = plan.windowed(plan.offset(), Some(limit));
        let mut rows = self.query::<T>(&statement, plan.shape())?;
        if rows.len() > 1 {
            return Err(AccessError::NonUniqueResult { rows: rows.len() });
        }
        Ok(rows.pop())
    }

    /// Counts rows matching `plan`, ignoring its ordering and window.
    pub fn count(&mut self, plan: &QueryPlan) -> AccessResult<u64> {
        self.flush()?;
        self.query_count(&plan.count_statement())
    }

    /// Fetches one page plus the total row count (two statements).
    pub fn fetch_page<T: FromRow>(
        &mut self,
        builder: QueryBuilder,
        request: &PageRequest,
    ) -> AccessResult<Page<T>> {
        let plan = builder.page(request).build()?;
        let content = self.fetch::<T>(&plan)?;
        let total = self.query_count(&plan.count_statement())?;
        Ok(Page::new(content, total, request))
    }

    /// Fetches one window without counting, probing one extra row.
    pub fn fetch_slice<T: FromRow>(
        &mut self,
        builder: QueryBuilder,
        request: &PageRequest,
    ) -> AccessResult<Slice<T>> {
        let plan = builder.page(request).build()?;
        self.flush()?;
        let probe = plan.windowed(request.offset(), Some(request.limit().saturating_add(1)));
        let rows = self.query::<T>(&probe, plan.shape())?;
        Ok(Slice::from_probe(rows, request))
    }

    /// Runs a row-returning template.
    pub fn fetch_template<T: FromRow>(&mut self, query: &BoundQuery) -> AccessResult<Vec<T>> {
        let shape = query.shape().ok_or_else(|| {
            AccessError::InvalidState(format!(
                "template `{}` is an update; use execute_template",
                query.name()
            ))
        })?;
        self.flush()?;
        self.query(query.statement(), shape)
    }

    /// Runs an update template. Every cached member becomes stale since the
    /// affected ids are unknown.
    pub fn execute_template(&mut self, query: &BoundQuery) -> AccessResult<BulkOutcome> {
        if query.kind() != TemplateKind::Update {
            return Err(AccessError::InvalidState(format!(
                "template `{}` returns rows; use fetch_template",
                query.name()
            )));
        }
        self.flush()?;
        let started_at = Instant::now();
        let affected = self.execute(query.statement())?;
        let stale = self.identity_map_mut().mark_all_stale();
        info!(
            "event=bulk_update module=session status=ok uow_id={} source=template affected={affected} stale={} duration_ms={}",
            self.context().id,
            stale.len(),
            started_at.elapsed().as_millis()
        );
        Ok(BulkOutcome { affected, stale })
    }

    /// Runs a bulk update or delete directly against the store.
    pub fn execute_bulk(&mut self, plan: &BulkPlan) -> AccessResult<BulkOutcome> {
        self.flush()?;
        let started_at = Instant::now();
        let mut ids = self.query_ids(&plan.statement()).map_err(|err| {
            error!(
                "event=bulk_update module=session status=error uow_id={} duration_ms={} error={err}",
                self.context().id,
                started_at.elapsed().as_millis()
            );
            err
        })?;
        ids.sort_unstable();
        let stale = self.identity_map_mut().mark_stale(&ids);
        info!(
            "event=bulk_update module=session status=ok uow_id={} source=plan delete={} affected={} stale={} duration_ms={}",
            self.context().id,
            plan.is_delete(),
            ids.len(),
            stale.len(),
            started_at.elapsed().as_millis()
        );
        Ok(BulkOutcome {
            affected: ids.len(),
            stale,
        })
    }
}
