//! End-to-end runs over the in-memory driver.

use std::sync::Arc;

use async_trait::async_trait;
use db_sampler::config::{MigrationConfig, MigrationSet, OrderedMap, TableOrder, TableSpec};
use db_sampler::drivers::MemoryDatabase;
use db_sampler::{
    Config, FetchRequest, FieldCleaner, Migrator, ReferenceStore, Result, Row, Sampler,
    SamplerContext, SamplerError, SamplerFactory, SamplerRegistry, SqlValue,
};

fn customers_spec() -> TableSpec {
    let mut spec = TableSpec::new("customers", "copyall");
    spec.remember = OrderedMap::from_iter([("id", "customer_ids".to_string())]);
    spec
}

fn orders_spec() -> TableSpec {
    let mut spec = TableSpec::new("orders", "matched");
    spec.references = OrderedMap::from_iter([("customer_id", "customer_ids".to_string())]);
    spec.remember = OrderedMap::from_iter([("id", "order_ids".to_string())]);
    spec
}

fn order_items_spec() -> TableSpec {
    let mut spec = TableSpec::new("order_items", "matched");
    spec.references = OrderedMap::from_iter([("order_id", "order_ids".to_string())]);
    spec
}

fn shop_set(tables: Vec<TableSpec>) -> MigrationSet {
    MigrationSet {
        name: "small".to_string(),
        tables,
        views: Vec::new(),
    }
}

fn shop_source() -> Arc<MemoryDatabase> {
    let source = Arc::new(MemoryDatabase::new("memory"));
    source.seed_table(
        "customers",
        vec![
            Row::new().with("id", 1i64).with("email", "ada@example.com"),
            Row::new().with("id", 2i64).with("email", "grace@example.com"),
        ],
    );
    source.seed_table(
        "orders",
        vec![
            Row::new().with("id", 10i64).with("customer_id", 1i64),
            Row::new().with("id", 11i64).with("customer_id", 3i64),
        ],
    );
    source.seed_table(
        "order_items",
        vec![
            Row::new().with("order_id", 10i64).with("sku", "A-1"),
            Row::new().with("order_id", 11i64).with("sku", "B-2"),
            Row::new().with("order_id", 10i64).with("sku", "C-3"),
        ],
    );
    source
}

fn destination() -> Arc<MemoryDatabase> {
    Arc::new(MemoryDatabase::new("memory"))
}

fn position(journal: &[String], entry: &str) -> usize {
    journal
        .iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("'{}' missing from journal {:?}", entry, journal))
}

#[tokio::test]
async fn test_remembered_values_restrict_later_tables() {
    let source = shop_source();
    let references = Arc::new(ReferenceStore::new());
    let registry = SamplerRegistry::with_builtins();

    let customers = registry
        .build(SamplerContext::new(
            customers_spec(),
            source.clone(),
            references.clone(),
            false,
        ))
        .unwrap();
    customers.execute().await.unwrap();
    assert_eq!(
        references.lookup("customer_ids"),
        vec![SqlValue::I64(1), SqlValue::I64(2)]
    );

    let orders = registry
        .build(SamplerContext::new(orders_spec(), source, references, false))
        .unwrap();
    let rows = orders.execute().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("customer_id"), Some(&SqlValue::I64(1)));
}

#[tokio::test]
async fn test_run_copies_consistent_sample() {
    let destination = destination();
    let migrator = Migrator::new(shop_source(), destination.clone(), MigrationConfig::default());

    let result = migrator
        .execute(&shop_set(vec![customers_spec(), orders_spec(), order_items_spec()]))
        .await
        .unwrap();

    assert_eq!(result.status, "completed");
    assert_eq!(result.rows_total, 5);
    assert_eq!(destination.rows("customers").len(), 2);
    assert_eq!(destination.rows("orders").len(), 1);

    let items = destination.rows("order_items");
    let skus: Vec<_> = items.iter().filter_map(|r| r.get("sku")).collect();
    assert_eq!(
        skus,
        vec![&SqlValue::Text("A-1".into()), &SqlValue::Text("C-3".into())]
    );
}

#[tokio::test]
async fn test_dependency_order_runs_producers_first() {
    let destination = destination();
    let migrator = Migrator::new(shop_source(), destination.clone(), MigrationConfig::default());

    let result = migrator
        .execute(&shop_set(vec![order_items_spec(), orders_spec(), customers_spec()]))
        .await
        .unwrap();

    let order: Vec<_> = result.tables.iter().map(|t| t.table.as_str()).collect();
    assert_eq!(order, vec!["customers", "orders", "order_items"]);
    assert_eq!(destination.rows("order_items").len(), 2);
}

#[tokio::test]
async fn test_declared_order_samples_unpopulated_reference_as_empty() {
    let destination = destination();
    let settings = MigrationConfig {
        table_order: TableOrder::Declared,
        ..MigrationConfig::default()
    };
    let migrator = Migrator::new(shop_source(), destination.clone(), settings);

    let result = migrator
        .execute(&shop_set(vec![orders_spec(), customers_spec()]))
        .await
        .unwrap();

    assert_eq!(result.tables[0].table, "orders");
    assert_eq!(result.tables[0].rows, 0);
    assert!(destination.has_table("orders"));
    assert_eq!(destination.rows("customers").len(), 2);
}

#[tokio::test]
async fn test_strict_references_fail_on_unpopulated_reference() {
    let destination = destination();
    let settings = MigrationConfig {
        table_order: TableOrder::Declared,
        strict_references: true,
        ..MigrationConfig::default()
    };
    let migrator = Migrator::new(shop_source(), destination.clone(), settings);

    let err = migrator
        .execute(&shop_set(vec![orders_spec(), customers_spec()]))
        .await
        .unwrap_err();

    assert!(err.is_config());
    assert!(matches!(err, SamplerError::Table { ref table, .. } if table == "orders"));
    assert!(!destination.has_table("customers"));
}

#[tokio::test]
async fn test_table_failure_aborts_before_later_tables() {
    let source = shop_source();
    source.fail_on("fetch_rows", "orders", "connection reset");
    let destination = destination();
    let migrator = Migrator::new(source, destination.clone(), MigrationConfig::default());

    let err = migrator
        .execute(&shop_set(vec![customers_spec(), orders_spec(), order_items_spec()]))
        .await
        .unwrap_err();

    match &err {
        SamplerError::Table { table, sampler, .. } => {
            assert_eq!(table, "orders");
            assert_eq!(sampler, "matched");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.format_detailed().contains("connection reset"));

    let journal = destination.journal();
    assert!(!journal.iter().any(|e| e.ends_with(" order_items")));
    assert_eq!(destination.rows("customers").len(), 2);
}

#[tokio::test]
async fn test_trigger_failure_is_reported_and_run_continues() {
    let source = shop_source();
    source.seed_triggers("orders", vec!["CREATE TRIGGER orders_audit".to_string()]);
    source.seed_triggers("order_items", vec!["CREATE TRIGGER items_audit".to_string()]);
    let destination = destination();
    destination.fail_on("apply_triggers", "orders", "function audit() does not exist");
    let migrator = Migrator::new(source, destination.clone(), MigrationConfig::default());

    let result = migrator
        .execute(&shop_set(vec![customers_spec(), orders_spec(), order_items_spec()]))
        .await
        .unwrap();

    assert_eq!(result.status, "completed");
    assert_eq!(result.trigger_failures.len(), 1);
    assert_eq!(result.trigger_failures[0].table, "orders");
    assert!(result.trigger_failures[0].error.contains("audit() does not exist"));
    assert_eq!(
        destination.triggers("order_items"),
        vec!["CREATE TRIGGER items_audit".to_string()]
    );
}

#[tokio::test]
async fn test_triggers_apply_after_rows_are_written() {
    let source = shop_source();
    source.seed_triggers("customers", vec!["CREATE TRIGGER customers_touch".to_string()]);
    let destination = destination();
    let migrator = Migrator::new(source, destination.clone(), MigrationConfig::default());

    migrator
        .execute(&shop_set(vec![customers_spec()]))
        .await
        .unwrap();

    let journal = destination.journal();
    assert!(
        position(&journal, "finalize_table customers")
            < position(&journal, "apply_triggers customers")
    );
}

#[tokio::test]
async fn test_finalize_once_per_table_including_empty() {
    let destination = destination();
    let migrator = Migrator::new(shop_source(), destination.clone(), MigrationConfig::default());
    let mut set = shop_set(vec![customers_spec(), orders_spec()]);
    set.tables.push(TableSpec::new("order_items", "empty"));

    let result = migrator.execute(&set).await.unwrap();

    assert_eq!(result.tables[2].rows, 0);
    assert!(destination.has_table("order_items"));
    for table in ["customers", "orders", "order_items"] {
        assert_eq!(destination.finalize_count(table), 1, "{table}");
    }
}

#[tokio::test]
async fn test_rows_are_written_in_batches() {
    let destination = destination();
    let settings = MigrationConfig {
        batch_size: 2,
        ..MigrationConfig::default()
    };
    let migrator = Migrator::new(shop_source(), destination.clone(), settings);

    migrator
        .execute(&shop_set(vec![TableSpec::new("order_items", "copyall")]))
        .await
        .unwrap();

    let inserts = destination
        .journal()
        .iter()
        .filter(|e| *e == "insert_rows order_items")
        .count();
    assert_eq!(inserts, 2);
    assert_eq!(destination.rows("order_items").len(), 3);
}

#[tokio::test]
async fn test_views_recreated_after_tables() {
    let source = shop_source();
    source.seed_view("customer_orders");
    let destination = destination();
    destination.seed_view("customer_orders");
    let migrator = Migrator::new(source, destination.clone(), MigrationConfig::default());
    let mut set = shop_set(vec![customers_spec(), orders_spec()]);
    set.views = vec!["customer_orders".to_string()];

    let result = migrator.execute(&set).await.unwrap();

    assert_eq!(result.views, vec!["customer_orders".to_string()]);
    assert!(destination.has_view("customer_orders"));
    let journal = destination.journal();
    assert!(position(&journal, "finalize_table orders") < position(&journal, "drop_view customer_orders"));
}

#[tokio::test]
async fn test_missing_view_aborts_run() {
    let migrator = Migrator::new(shop_source(), destination(), MigrationConfig::default());
    let mut set = shop_set(vec![customers_spec()]);
    set.views = vec!["missing_view".to_string()];

    let err = migrator.execute(&set).await.unwrap_err();
    assert!(matches!(err, SamplerError::View { ref view, .. } if view == "missing_view"));
}

#[tokio::test]
async fn test_dialect_mismatch_rejected_before_any_work() {
    let source = shop_source();
    let destination = Arc::new(MemoryDatabase::new("mysql"));
    let migrator = Migrator::new(source.clone(), destination.clone(), MigrationConfig::default());

    let err = migrator
        .execute(&shop_set(vec![customers_spec()]))
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert!(source.journal().is_empty());
    assert!(destination.journal().is_empty());
}

struct Initials;

impl FieldCleaner for Initials {
    fn clean(&self, value: &SqlValue, _row: &Row, _args: &[String]) -> Result<SqlValue> {
        Ok(match value {
            SqlValue::Text(text) => SqlValue::Text(text.chars().take(1).collect()),
            other => other.clone(),
        })
    }
}

#[tokio::test]
async fn test_custom_cleaner_registered_on_migrator() {
    let destination = destination();
    let mut migrator = Migrator::new(shop_source(), destination.clone(), MigrationConfig::default());
    migrator.register_cleaner("initials", Arc::new(Initials));

    let mut customers = customers_spec();
    customers.clean = OrderedMap::from_iter([("email", "initials".to_string())]);
    migrator.execute(&shop_set(vec![customers])).await.unwrap();

    let emails: Vec<_> = destination
        .rows("customers")
        .iter()
        .filter_map(|r| r.get("email").cloned())
        .collect();
    assert_eq!(
        emails,
        vec![SqlValue::Text("a".into()), SqlValue::Text("g".into())]
    );
}

#[tokio::test]
async fn test_rerun_replaces_previous_sample() {
    let destination = destination();
    let migrator = Migrator::new(shop_source(), destination.clone(), MigrationConfig::default());
    let set = shop_set(vec![customers_spec()]);

    migrator.execute(&set).await.unwrap();
    let second = migrator.execute(&set).await.unwrap();

    assert_ne!(second.run_id, "");
    assert_eq!(destination.rows("customers").len(), 2);
}

/// Keeps rows whose `id` is odd.
struct OddIds {
    context: SamplerContext,
}

impl OddIds {
    fn validate(spec: &TableSpec) -> Result<()> {
        if spec.limit.is_some() {
            return Err(SamplerError::Config(format!(
                "Sampler 'oddids' takes no limit (table '{}')",
                spec.table
            )));
        }
        Ok(())
    }

    fn build(context: SamplerContext) -> Result<Box<dyn Sampler>> {
        Ok(Box::new(Self { context }))
    }
}

#[async_trait]
impl Sampler for OddIds {
    fn name(&self) -> &str {
        "oddids"
    }

    fn context(&self) -> &SamplerContext {
        &self.context
    }

    async fn sample(&self) -> Result<Vec<Row>> {
        let rows = self
            .context
            .source
            .fetch_rows(&FetchRequest::table(self.context.table()))
            .await?;
        Ok(rows
            .into_iter()
            .filter(|r| matches!(r.get("id"), Some(SqlValue::I64(id)) if id % 2 == 1))
            .collect())
    }
}

const ODD_IDS_CONFIG: &str = r#"
source:
  type: postgres
  host: prod-db
  database: shop
  user: reader
destination:
  type: postgres
  host: localhost
  database: shop_sample
  user: writer
sets:
  - name: small
    tables:
      - table: customers
        sampler: oddids
        remember:
          id: customer_ids
      - table: orders
        sampler: matched
        references:
          customer_id: customer_ids
"#;

fn odd_ids_registry() -> SamplerRegistry {
    let mut registry = SamplerRegistry::with_builtins();
    registry.register(
        "oddids",
        SamplerFactory {
            name: "oddids",
            validate: OddIds::validate,
            build: OddIds::build,
        },
    );
    registry
}

#[tokio::test]
async fn test_custom_sampler_from_configuration() {
    assert!(Config::from_yaml(ODD_IDS_CONFIG).unwrap_err().is_config());

    let config = Config::from_yaml_with(ODD_IDS_CONFIG, &odd_ids_registry()).unwrap();
    let destination = destination();
    let migrator = Migrator::new(shop_source(), destination.clone(), config.migration.clone())
        .with_samplers(odd_ids_registry());

    let result = migrator.execute(&config.sets[0]).await.unwrap();

    assert_eq!(result.tables[0].table, "customers");
    assert_eq!(result.tables[0].sampler, "oddids");
    let customers = destination.rows("customers");
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0].get("id"), Some(&SqlValue::I64(1)));
    let orders = destination.rows("orders");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].get("id"), Some(&SqlValue::I64(10)));
}

#[test]
fn test_custom_sampler_parameters_checked_at_load() {
    let yaml = ODD_IDS_CONFIG.replace("sampler: oddids", "sampler: oddids\n        limit: 5");
    let err = Config::from_yaml_with(&yaml, &odd_ids_registry()).unwrap_err();
    assert!(err.to_string().contains("takes no limit"));
}
