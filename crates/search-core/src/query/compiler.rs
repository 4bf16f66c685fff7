//! Compiles expression trees into complete SQL queries.
//!
//! Predicates on normalized parameter tables become correlated `EXISTS`
//! sub-queries scoped to the parameter URI, so every field of one parameter
//! value is matched on the same row:
//!
//! ```text
//! SELECT ... FROM resource r
//! WHERE r.resource_type = ?1 AND r.is_history = 0 AND r.is_deleted = 0
//!   AND EXISTS (SELECT 1 FROM token_search_param tk1
//!               WHERE tk1.resource_surrogate_id = r.resource_surrogate_id
//!                 AND tk1.search_param_uri = ?2
//!                 AND (tk1.system_id = ?3 AND tk1.code = ?4))
//! ```

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::{ExpressionError, SearchError, StorageError, StorageResult};
use crate::expression::{
    ChainedExpression, Expression, FieldName, MissingSearchParameterExpression,
    SearchParameterExpression,
};
use crate::types::SearchParameterInfo;

use super::context::QueryGeneratorContext;
use super::fragment::{SqlFragment, SqlParam};
use super::generators::{QueryCategory, SearchParameterQueryGenerator, unsupported};
use super::registry::QueryGeneratorRegistry;
use super::system_cache::SystemIdCache;
use super::tables::{self, RESOURCE_SURROGATE_ID, SEARCH_PARAM_URI};

/// Columns selected for every search result row.
const RESOURCE_COLUMNS: &str = "r.resource_surrogate_id, r.resource_type, r.resource_id, \
     r.version, r.last_updated, r.raw_resource";

/// A compiled query, ready to be paged by a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// The resource type searched.
    pub resource_type: String,
    /// SQL text without paging clauses.
    pub sql: String,
    /// Bound parameters in placeholder order.
    pub params: Vec<SqlParam>,
    /// Hash of the query shape, embedded in continuation tokens.
    pub query_hash: String,
}

impl CompiledQuery {
    /// Wraps an already built fragment.
    pub fn from_fragment(resource_type: impl Into<String>, fragment: SqlFragment) -> Self {
        let query_hash = hash_query(&fragment);
        Self {
            resource_type: resource_type.into(),
            sql: fragment.sql,
            params: fragment.params,
            query_hash,
        }
    }

    /// Returns the SQL and parameters for one page.
    ///
    /// Rows are ordered by surrogate id; `after` resumes behind the last row
    /// of the previous page. One extra row is requested so the caller can
    /// tell whether another page exists.
    pub fn paged(&self, after: Option<i64>, page_size: usize) -> SqlFragment {
        let mut fragment = SqlFragment::with_params(self.sql.clone(), self.params.clone());
        if let Some(after) = after {
            let p = fragment.add_param(SqlParam::integer(after));
            fragment.push_str(&format!(" AND r.{} > {}", RESOURCE_SURROGATE_ID, p));
        }
        let limit = i64::try_from(page_size)
            .unwrap_or(i64::MAX)
            .saturating_add(1);
        let limit = fragment.add_param(SqlParam::integer(limit));
        fragment.push_str(&format!(
            " ORDER BY r.{} LIMIT {}",
            RESOURCE_SURROGATE_ID, limit
        ));
        fragment
    }
}

fn hash_query(fragment: &SqlFragment) -> String {
    let mut hasher = Sha256::new();
    hasher.update(fragment.sql.as_bytes());
    hasher.update(b"\n");
    hasher.update(serde_json::to_vec(&fragment.params).unwrap_or_default());
    hex::encode(&hasher.finalize()[..16])
}

/// Compiles expression trees using the generator registry.
#[derive(Debug, Clone)]
pub struct SqlQueryCompiler {
    registry: Arc<QueryGeneratorRegistry>,
    system_cache: Arc<SystemIdCache>,
}

impl SqlQueryCompiler {
    /// Creates a compiler.
    pub fn new(registry: Arc<QueryGeneratorRegistry>, system_cache: Arc<SystemIdCache>) -> Self {
        Self {
            registry,
            system_cache,
        }
    }

    /// Returns the generator registry.
    pub fn registry(&self) -> &Arc<QueryGeneratorRegistry> {
        &self.registry
    }

    /// Compiles a search over `resource_type`, optionally filtered by `expression`.
    pub fn compile(
        &self,
        resource_type: &str,
        expression: Option<&Expression>,
    ) -> StorageResult<CompiledQuery> {
        let mut ctx =
            QueryGeneratorContext::new(resource_type, tables::RESOURCE.alias, &self.system_cache);

        ctx.push(&format!(
            "SELECT {} FROM {} r WHERE r.{} = ",
            RESOURCE_COLUMNS,
            tables::RESOURCE.name,
            tables::resource::RESOURCE_TYPE
        ));
        ctx.push_param(SqlParam::string(resource_type));
        ctx.push(" AND r.is_history = 0 AND r.is_deleted = 0");

        if let Some(expression) = expression {
            ctx.push(" AND (");
            self.compile_predicate(expression, &mut ctx)?;
            ctx.push(")");
        }

        Ok(CompiledQuery::from_fragment(
            resource_type,
            ctx.into_fragment(),
        ))
    }

    fn compile_predicate(
        &self,
        expression: &Expression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        match expression {
            Expression::SearchParameter(e) => self.compile_search_parameter(e, ctx),
            Expression::MissingSearchParameter(e) => self.compile_missing_parameter(e, ctx),
            Expression::Chained(e) => self.compile_chained(e, ctx),
            Expression::Compartment(e) => {
                let generator = self.generator(QueryCategory::Compartment)?;
                let table = generator.table();
                let alias = ctx.next_alias(table.alias);
                let outer = ctx.table_alias().to_string();
                ctx.push(&format!(
                    "EXISTS (SELECT 1 FROM {} {} WHERE {}.{} = {}.{} AND ",
                    table.name, alias, alias, RESOURCE_SURROGATE_ID, outer, RESOURCE_SURROGATE_ID
                ));
                ctx.with_alias(&alias, |ctx| generator.visit_compartment(e, ctx))?;
                ctx.push(")");
                Ok(())
            }
            Expression::Multiary(e) => self.compile_group(
                &e.expressions,
                e.operator.as_sql(),
                e.operator == crate::expression::MultiaryOperator::And,
                ctx,
                |this, child, ctx| this.compile_predicate(child, ctx),
            ),
            Expression::Not(inner) => {
                ctx.push("NOT (");
                self.compile_predicate(inner, ctx)?;
                ctx.push(")");
                Ok(())
            }
            Expression::Binary(e) => Err(missing_scope(e.field)),
            Expression::String(e) => Err(missing_scope(e.field)),
            Expression::MissingField(e) => Err(missing_scope(e.field)),
        }
    }

    fn compile_search_parameter(
        &self,
        expression: &SearchParameterExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        let (category, generator) = self.generator_for(&expression.parameter)?;

        if category == QueryCategory::ResourceTable {
            return self.compile_fields(&expression.expression, generator.as_ref(), ctx);
        }

        self.open_parameter_exists(&expression.parameter, generator.as_ref(), ctx, |this, ctx| {
            ctx.push(" AND (");
            this.compile_fields(&expression.expression, generator.as_ref(), ctx)?;
            ctx.push(")");
            Ok(())
        })
    }

    fn compile_missing_parameter(
        &self,
        expression: &MissingSearchParameterExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        let (category, generator) = self.generator_for(&expression.parameter)?;

        if category == QueryCategory::ResourceTable {
            // Resource table columns are never null.
            ctx.push(if expression.is_missing { "1 = 0" } else { "1 = 1" });
            return Ok(());
        }

        if expression.is_missing {
            ctx.push("NOT ");
        }
        self.open_parameter_exists(&expression.parameter, generator.as_ref(), ctx, |_, _| Ok(()))
    }

    /// Emits `EXISTS (SELECT 1 FROM <table> <alias> WHERE <correlation> AND <uri>` then
    /// lets `body` append further conditions before closing the sub-query.
    fn open_parameter_exists(
        &self,
        parameter: &SearchParameterInfo,
        generator: &dyn SearchParameterQueryGenerator,
        ctx: &mut QueryGeneratorContext<'_>,
        body: impl FnOnce(&Self, &mut QueryGeneratorContext<'_>) -> StorageResult<()>,
    ) -> StorageResult<()> {
        let table = generator.table();
        let alias = ctx.next_alias(table.alias);
        let outer = ctx.table_alias().to_string();

        ctx.push(&format!(
            "EXISTS (SELECT 1 FROM {} {} WHERE {}.{} = {}.{} AND {}.{} = ",
            table.name,
            alias,
            alias,
            RESOURCE_SURROGATE_ID,
            outer,
            RESOURCE_SURROGATE_ID,
            alias,
            SEARCH_PARAM_URI
        ));
        ctx.push_param(SqlParam::string(&parameter.url));
        ctx.with_alias(&alias, |ctx| body(self, ctx))?;
        ctx.push(")");
        Ok(())
    }

    fn compile_chained(
        &self,
        expression: &ChainedExpression,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        let (_, generator) = self.generator_for(&expression.reference_parameter)?;
        let table = generator.table();
        let ref_alias = ctx.next_alias(table.alias);
        let res_alias = ctx.next_alias(tables::RESOURCE.alias);
        let outer = ctx.table_alias().to_string();

        if expression.reversed {
            // Resources of `resource_type` whose reference points back at the outer row.
            ctx.push(&format!(
                "EXISTS (SELECT 1 FROM {table} {ra} JOIN {res} {rs} ON {rs}.{sid} = {ra}.{sid} \
                 WHERE {ra}.{uri} = ",
                table = table.name,
                ra = ref_alias,
                res = tables::RESOURCE.name,
                rs = res_alias,
                sid = RESOURCE_SURROGATE_ID,
                uri = SEARCH_PARAM_URI,
            ));
            ctx.push_param(SqlParam::string(&expression.reference_parameter.url));
            ctx.push(&format!(
                " AND {ra}.{rtype} = {outer}.{otype} AND {ra}.{rid} = {outer}.{oid} AND {rs}.{otype} = ",
                ra = ref_alias,
                rs = res_alias,
                outer = outer,
                rtype = tables::reference::REFERENCE_RESOURCE_TYPE,
                rid = tables::reference::REFERENCE_RESOURCE_ID,
                otype = tables::resource::RESOURCE_TYPE,
                oid = tables::resource::RESOURCE_ID,
            ));
            ctx.push_param(SqlParam::string(&expression.resource_type));
        } else {
            // Outer row references a `target_resource_type` resource.
            ctx.push(&format!(
                "EXISTS (SELECT 1 FROM {table} {ra} JOIN {res} {rs} \
                 ON {rs}.{otype} = {ra}.{rtype} AND {rs}.{oid} = {ra}.{rid} \
                 WHERE {ra}.{sid} = {outer}.{sid} AND {ra}.{uri} = ",
                table = table.name,
                ra = ref_alias,
                res = tables::RESOURCE.name,
                rs = res_alias,
                outer = outer,
                sid = RESOURCE_SURROGATE_ID,
                uri = SEARCH_PARAM_URI,
                rtype = tables::reference::REFERENCE_RESOURCE_TYPE,
                rid = tables::reference::REFERENCE_RESOURCE_ID,
                otype = tables::resource::RESOURCE_TYPE,
                oid = tables::resource::RESOURCE_ID,
            ));
            ctx.push_param(SqlParam::string(&expression.reference_parameter.url));
            ctx.push(&format!(
                " AND {}.{} = ",
                ref_alias,
                tables::reference::REFERENCE_RESOURCE_TYPE
            ));
            ctx.push_param(SqlParam::string(&expression.target_resource_type));
        }

        ctx.push(&format!(
            " AND {rs}.is_history = 0 AND {rs}.is_deleted = 0 AND (",
            rs = res_alias
        ));
        ctx.with_alias(&res_alias, |ctx| {
            self.compile_predicate(&expression.expression, ctx)
        })?;
        ctx.push("))");
        Ok(())
    }

    /// Compiles the field nodes below a search parameter scope.
    fn compile_fields(
        &self,
        expression: &Expression,
        generator: &dyn SearchParameterQueryGenerator,
        ctx: &mut QueryGeneratorContext<'_>,
    ) -> StorageResult<()> {
        match expression {
            Expression::Binary(e) => {
                check_component_index(generator, "Binary", e.field, e.component_index)?;
                generator.visit_binary(e, ctx)
            }
            Expression::String(e) => {
                check_component_index(generator, "String", e.field, e.component_index)?;
                generator.visit_string(e, ctx)
            }
            Expression::MissingField(e) => {
                check_component_index(generator, "MissingField", e.field, e.component_index)?;
                generator.visit_missing_field(e, ctx)
            }
            Expression::Compartment(e) => generator.visit_compartment(e, ctx),
            Expression::Multiary(e) => self.compile_group(
                &e.expressions,
                e.operator.as_sql(),
                e.operator == crate::expression::MultiaryOperator::And,
                ctx,
                |this, child, ctx| this.compile_fields(child, generator, ctx),
            ),
            Expression::Not(inner) => {
                ctx.push("NOT (");
                self.compile_fields(inner, generator, ctx)?;
                ctx.push(")");
                Ok(())
            }
            nested => Err(ExpressionError::UnsupportedExpression {
                category: generator.category().to_string(),
                node: nested.node_name().to_string(),
                field: "-".to_string(),
            }
            .into()),
        }
    }

    fn compile_group(
        &self,
        children: &[Expression],
        keyword: &str,
        is_and: bool,
        ctx: &mut QueryGeneratorContext<'_>,
        mut compile_child: impl FnMut(&Self, &Expression, &mut QueryGeneratorContext<'_>) -> StorageResult<()>,
    ) -> StorageResult<()> {
        if children.is_empty() {
            ctx.push(if is_and { "1 = 1" } else { "1 = 0" });
            return Ok(());
        }

        ctx.push("(");
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                ctx.push(" ");
                ctx.push(keyword);
                ctx.push(" ");
            }
            ctx.push("(");
            compile_child(self, child, ctx)?;
            ctx.push(")");
        }
        ctx.push(")");
        Ok(())
    }

    fn generator(
        &self,
        category: QueryCategory,
    ) -> StorageResult<Arc<dyn SearchParameterQueryGenerator>> {
        self.registry.get(category).cloned().ok_or_else(|| {
            SearchError::NoGenerator {
                url: "-".to_string(),
                param_type: category.to_string(),
            }
            .into()
        })
    }

    fn generator_for(
        &self,
        parameter: &SearchParameterInfo,
    ) -> StorageResult<(QueryCategory, Arc<dyn SearchParameterQueryGenerator>)> {
        if !parameter.is_searchable {
            return Err(SearchError::ParameterNotSearchable {
                url: parameter.url.clone(),
            }
            .into());
        }

        let category = self.registry.resolve(parameter).ok_or_else(|| {
            StorageError::from(SearchError::NoGenerator {
                url: parameter.url.clone(),
                param_type: parameter.param_type.to_string(),
            })
        })?;
        Ok((category, self.generator(category)?))
    }
}

fn missing_scope(field: FieldName) -> StorageError {
    ExpressionError::MissingParameterScope {
        field: field.to_string(),
    }
    .into()
}

/// Component indices only address the columns of composite parameters.
fn check_component_index(
    generator: &dyn SearchParameterQueryGenerator,
    node: &str,
    field: FieldName,
    component_index: Option<usize>,
) -> StorageResult<()> {
    if component_index.is_some() && !generator.category().is_composite() {
        return Err(unsupported(generator.category(), node, field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::FieldName;
    use crate::types::SearchParamType;

    fn compiler() -> SqlQueryCompiler {
        SqlQueryCompiler::new(
            Arc::new(QueryGeneratorRegistry::new()),
            Arc::new(SystemIdCache::new()),
        )
    }

    fn code_param() -> Arc<SearchParameterInfo> {
        Arc::new(
            SearchParameterInfo::new(
                "http://hl7.org/fhir/SearchParameter/clinical-code",
                "code",
                SearchParamType::Token,
            )
            .with_base(["Observation"]),
        )
    }

    #[test]
    fn test_compile_without_expression() {
        let query = compiler().compile("Patient", None).unwrap();
        assert!(query.sql.starts_with("SELECT r.resource_surrogate_id"));
        assert!(query.sql.ends_with("r.is_history = 0 AND r.is_deleted = 0"));
        assert_eq!(query.params, vec![SqlParam::String("Patient".to_string())]);
    }

    #[test]
    fn test_compile_token_parameter() {
        let expr = Expression::search_parameter(
            code_param(),
            Expression::and(vec![
                Expression::string_equals(FieldName::TokenSystem, "http://loinc.org"),
                Expression::string_equals(FieldName::TokenCode, "8480-6"),
            ]),
        );
        let query = compiler().compile("Observation", Some(&expr)).unwrap();

        assert!(query.sql.contains(
            "EXISTS (SELECT 1 FROM token_search_param tk1 WHERE tk1.resource_surrogate_id = r.resource_surrogate_id AND tk1.search_param_uri = ?2"
        ));
        assert!(query.sql.contains("tk1.system_id IN (SELECT system_id FROM system WHERE value = ?3)"));
        assert!(query.sql.contains("tk1.code = ?4"));
        assert_eq!(query.params.len(), 4);
    }

    #[test]
    fn test_resource_table_parameter_uses_outer_alias() {
        let id = Arc::new(SearchParameterInfo::new(
            "http://hl7.org/fhir/SearchParameter/Resource-id",
            "_id",
            SearchParamType::Token,
        ));
        let expr = Expression::search_parameter(
            id,
            Expression::string_equals(FieldName::ResourceId, "p1"),
        );
        let query = compiler().compile("Patient", Some(&expr)).unwrap();
        assert!(query.sql.ends_with("AND (r.resource_id = ?2)"));
    }

    #[test]
    fn test_not_searchable_parameter_rejected() {
        let param = Arc::new((*code_param()).clone().with_flags(false, true, false));
        let expr = Expression::search_parameter(
            param,
            Expression::string_equals(FieldName::TokenCode, "x"),
        );
        assert!(matches!(
            compiler().compile("Observation", Some(&expr)),
            Err(StorageError::Search(SearchError::ParameterNotSearchable { .. }))
        ));
    }

    #[test]
    fn test_field_outside_scope_rejected() {
        let expr = Expression::string_equals(FieldName::TokenCode, "x");
        assert!(matches!(
            compiler().compile("Observation", Some(&expr)),
            Err(StorageError::Expression(ExpressionError::MissingParameterScope { .. }))
        ));
    }

    #[test]
    fn test_missing_parameter() {
        let expr = Expression::missing_search_parameter(code_param(), true);
        let query = compiler().compile("Observation", Some(&expr)).unwrap();
        assert!(query.sql.contains("AND (NOT EXISTS (SELECT 1 FROM token_search_param tk1"));
    }

    #[test]
    fn test_query_hash_depends_on_values() {
        let a = Expression::search_parameter(
            code_param(),
            Expression::string_equals(FieldName::TokenCode, "a"),
        );
        let b = Expression::search_parameter(
            code_param(),
            Expression::string_equals(FieldName::TokenCode, "b"),
        );
        let qa = compiler().compile("Observation", Some(&a)).unwrap();
        let qa2 = compiler().compile("Observation", Some(&a)).unwrap();
        let qb = compiler().compile("Observation", Some(&b)).unwrap();
        assert_eq!(qa.query_hash, qa2.query_hash);
        assert_ne!(qa.query_hash, qb.query_hash);
    }

    #[test]
    fn test_paged_appends_cursor_and_limit() {
        let query = compiler().compile("Patient", None).unwrap();
        let first = query.paged(None, 10);
        assert!(first.sql.ends_with("ORDER BY r.resource_surrogate_id LIMIT ?2"));
        assert_eq!(first.params[1], SqlParam::Integer(11));

        let next = query.paged(Some(42), 10);
        assert!(next.sql.contains("AND r.resource_surrogate_id > ?2 ORDER BY"));
        assert_eq!(next.params[1], SqlParam::Integer(42));
        assert_eq!(next.params[2], SqlParam::Integer(11));
    }

    #[test]
    fn test_reverse_chain() {
        let subject = Arc::new(
            SearchParameterInfo::new(
                "http://hl7.org/fhir/SearchParameter/Observation-subject",
                "subject",
                SearchParamType::Reference,
            )
            .with_base(["Observation"]),
        );
        let expr = Expression::reverse_chained(
            "Observation",
            subject,
            "Patient",
            Expression::search_parameter(
                code_param(),
                Expression::string_equals(FieldName::TokenCode, "8480-6"),
            ),
        );
        let query = compiler().compile("Patient", Some(&expr)).unwrap();
        assert!(query.sql.contains("FROM reference_search_param rf1 JOIN resource r2"));
        assert!(query.sql.contains("rf1.reference_resource_id = r.resource_id"));
        assert!(query.sql.contains("tk3.resource_surrogate_id = r2.resource_surrogate_id"));
    }
}
