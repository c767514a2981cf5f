//! Ordered containers: Project -> Assembly -> Layer -> Segment.
//!
//! Every container row stores the ids of its children as a JSON array next to
//! an `order_version` counter. The child's foreign key says who owns it; the
//! array says in which order it is shown. Writes to the array are a
//! compare-and-swap on `order_version`, done in the same transaction that
//! inserts or deletes the child, and retried when another writer got there
//! first.
//!
//! ```rust
//! use portal::services::ordering::OrderList;
//!
//! let mut order = OrderList::parse("[3, 1]").unwrap();
//! order.push(7);
//! assert_eq!(order.to_json(), "[3,1,7]");
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::common::db_errors::DbErrorKind;
use crate::database::entities::{assemblies, layer_segments, layers, projects};
use crate::errors::{ContainerError, ContainerResult};

/// Attempts made before an order-list write gives up with `Contention`.
pub const MAX_ATTEMPTS: usize = 8;

const RETRY_BACKOFF: Duration = Duration::from_millis(15);

/// The ordered child ids of one container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderList(Vec<i32>);

impl OrderList {
    pub fn new(ids: Vec<i32>) -> Self {
        Self(ids)
    }

    /// Parse the stored column. A blank column is an empty list.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> String {
        let ids: Vec<String> = self.0.iter().map(|id| id.to_string()).collect();
        format!("[{}]", ids.join(","))
    }

    pub fn ids(&self) -> &[i32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: i32) -> bool {
        self.0.contains(&id)
    }

    pub fn first(&self) -> Option<i32> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<i32> {
        self.0.last().copied()
    }

    pub fn push(&mut self, id: i32) {
        self.0.push(id);
    }

    /// Remove every occurrence of `id`; returns whether anything was removed.
    pub fn remove(&mut self, id: i32) -> bool {
        let before = self.0.len();
        self.0.retain(|&existing| existing != id);
        before != self.0.len()
    }

    /// Swap `id` with its neighbour. `None` when `id` is not listed,
    /// `Some(false)` when it is already at that end.
    pub fn move_child(&mut self, id: i32, direction: MoveDirection) -> Option<bool> {
        let index = self.0.iter().position(|&existing| existing == id)?;
        let target = match direction {
            MoveDirection::Up if index > 0 => index - 1,
            MoveDirection::Down if index + 1 < self.0.len() => index + 1,
            _ => return Some(false),
        };
        self.0.swap(index, target);
        Some(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Project,
    Assembly,
    Layer,
}

impl ContainerKind {
    pub fn name(&self) -> &'static str {
        match self {
            ContainerKind::Project => "project",
            ContainerKind::Assembly => "assembly",
            ContainerKind::Layer => "layer",
        }
    }

    pub fn child_name(&self) -> &'static str {
        match self {
            ContainerKind::Project => "assembly",
            ContainerKind::Assembly => "layer",
            ContainerKind::Layer => "segment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerRef {
    pub kind: ContainerKind,
    pub id: i32,
}

impl ContainerRef {
    pub fn project(id: i32) -> Self {
        Self { kind: ContainerKind::Project, id }
    }

    pub fn assembly(id: i32) -> Self {
        Self { kind: ContainerKind::Assembly, id }
    }

    pub fn layer(id: i32) -> Self {
        Self { kind: ContainerKind::Layer, id }
    }

    fn not_found(&self) -> ContainerError {
        ContainerError::not_found(self.kind.name(), self.id)
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.name(), self.id)
    }
}

/// Disagreement between an order list and the rows that actually exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderDrift {
    /// Listed ids with no child row
    pub dangling: Vec<i32>,
    /// Child rows whose id is not listed, in id order
    pub unlisted: Vec<i32>,
}

impl OrderDrift {
    pub fn is_clean(&self) -> bool {
        self.dangling.is_empty() && self.unlisted.is_empty()
    }
}

/// Children in display order plus whatever drift was found reading them.
#[derive(Debug, Clone)]
pub struct Ordered<M> {
    pub children: Vec<M>,
    pub drift: OrderDrift,
}

/// Sort `rows` by `order`. Listed ids without a row are skipped, rows that are
/// not listed are left out, and both are reported. Repeated ids count once.
pub fn arrange<T>(order: &OrderList, rows: Vec<T>, id_of: impl Fn(&T) -> i32) -> (Vec<T>, OrderDrift) {
    let mut by_id: HashMap<i32, T> = rows.into_iter().map(|row| (id_of(&row), row)).collect();
    let mut seen = HashSet::new();
    let mut children = Vec::with_capacity(order.len());
    let mut drift = OrderDrift::default();

    for &id in order.ids() {
        if !seen.insert(id) {
            continue;
        }
        match by_id.remove(&id) {
            Some(row) => children.push(row),
            None => drift.dangling.push(id),
        }
    }

    drift.unlisted = by_id.into_keys().collect();
    drift.unlisted.sort_unstable();
    (children, drift)
}

/// A child row kind that lives in some container's order list.
pub trait ChildModel: Sized + Send + Sync {
    type Entity: EntityTrait<Model = Self>;

    const PARENT: ContainerKind;

    fn child_id(&self) -> i32;

    fn parent_column() -> <Self::Entity as EntityTrait>::Column;

    fn id_column() -> <Self::Entity as EntityTrait>::Column;
}

impl ChildModel for assemblies::Model {
    type Entity = assemblies::Entity;
    const PARENT: ContainerKind = ContainerKind::Project;

    fn child_id(&self) -> i32 {
        self.id
    }

    fn parent_column() -> assemblies::Column {
        assemblies::Column::ProjectId
    }

    fn id_column() -> assemblies::Column {
        assemblies::Column::Id
    }
}

impl ChildModel for layers::Model {
    type Entity = layers::Entity;
    const PARENT: ContainerKind = ContainerKind::Assembly;

    fn child_id(&self) -> i32 {
        self.id
    }

    fn parent_column() -> layers::Column {
        layers::Column::AssemblyId
    }

    fn id_column() -> layers::Column {
        layers::Column::Id
    }
}

impl ChildModel for layer_segments::Model {
    type Entity = layer_segments::Entity;
    const PARENT: ContainerKind = ContainerKind::Layer;

    fn child_id(&self) -> i32 {
        self.id
    }

    fn parent_column() -> layer_segments::Column {
        layer_segments::Column::LayerId
    }

    fn id_column() -> layer_segments::Column {
        layer_segments::Column::Id
    }
}

/// Read a container's order list and version.
pub async fn load_order<C: ConnectionTrait>(
    conn: &C,
    container: ContainerRef,
) -> ContainerResult<(OrderList, i32)> {
    let (raw, version) = match container.kind {
        ContainerKind::Project => projects::Entity::find_by_id(container.id)
            .one(conn)
            .await?
            .map(|p| (p.assembly_id_order, p.order_version)),
        ContainerKind::Assembly => assemblies::Entity::find_by_id(container.id)
            .one(conn)
            .await?
            .map(|a| (a.layer_id_order, a.order_version)),
        ContainerKind::Layer => layers::Entity::find_by_id(container.id)
            .one(conn)
            .await?
            .map(|l| (l.segment_id_order, l.order_version)),
    }
    .ok_or_else(|| container.not_found())?;

    Ok((OrderList::parse(&raw)?, version))
}

/// Write `order` if the stored version is still `expected_version`.
/// Returns false when another writer bumped the version first.
pub async fn store_order<C: ConnectionTrait>(
    conn: &C,
    container: ContainerRef,
    order: &OrderList,
    expected_version: i32,
) -> ContainerResult<bool> {
    let json = order.to_json();
    let next = expected_version + 1;
    let result = match container.kind {
        ContainerKind::Project => {
            projects::Entity::update_many()
                .col_expr(projects::Column::AssemblyIdOrder, Expr::value(json))
                .col_expr(projects::Column::OrderVersion, Expr::value(next))
                .filter(projects::Column::Id.eq(container.id))
                .filter(projects::Column::OrderVersion.eq(expected_version))
                .exec(conn)
                .await?
        }
        ContainerKind::Assembly => {
            assemblies::Entity::update_many()
                .col_expr(assemblies::Column::LayerIdOrder, Expr::value(json))
                .col_expr(assemblies::Column::OrderVersion, Expr::value(next))
                .filter(assemblies::Column::Id.eq(container.id))
                .filter(assemblies::Column::OrderVersion.eq(expected_version))
                .exec(conn)
                .await?
        }
        ContainerKind::Layer => {
            layers::Entity::update_many()
                .col_expr(layers::Column::SegmentIdOrder, Expr::value(json))
                .col_expr(layers::Column::OrderVersion, Expr::value(next))
                .filter(layers::Column::Id.eq(container.id))
                .filter(layers::Column::OrderVersion.eq(expected_version))
                .exec(conn)
                .await?
        }
    };
    Ok(result.rows_affected == 1)
}

/// The children of `parent_id` in display order. Drift is logged, not raised.
pub async fn get_ordered_children<M, C>(conn: &C, parent_id: i32) -> ContainerResult<Ordered<M>>
where
    M: ChildModel,
    C: ConnectionTrait,
{
    let container = ContainerRef { kind: M::PARENT, id: parent_id };
    let (order, _) = load_order(conn, container).await?;
    let rows = M::Entity::find()
        .filter(M::parent_column().eq(parent_id))
        .order_by_asc(M::id_column())
        .all(conn)
        .await?;

    let (children, drift) = arrange(&order, rows, M::child_id);
    if !drift.is_clean() {
        warn!(
            "Order list of {} out of step: dangling {:?}, unlisted {:?}",
            container, drift.dangling, drift.unlisted
        );
    }
    Ok(Ordered { children, drift })
}

async fn owned_child_ids<C: ConnectionTrait>(
    conn: &C,
    container: ContainerRef,
) -> ContainerResult<Vec<i32>> {
    async fn ids<M: ChildModel, C: ConnectionTrait>(conn: &C, parent_id: i32) -> ContainerResult<Vec<i32>> {
        Ok(M::Entity::find()
            .filter(M::parent_column().eq(parent_id))
            .order_by_asc(M::id_column())
            .all(conn)
            .await?
            .iter()
            .map(M::child_id)
            .collect())
    }

    match container.kind {
        ContainerKind::Project => ids::<assemblies::Model, C>(conn, container.id).await,
        ContainerKind::Assembly => ids::<layers::Model, C>(conn, container.id).await,
        ContainerKind::Layer => ids::<layer_segments::Model, C>(conn, container.id).await,
    }
}

/// What to create when appending a child.
#[derive(Debug, Clone)]
pub enum NewChild {
    Assembly { name: String, user_id: Option<i32> },
    /// A layer always starts with one empty segment
    Layer { thickness_mm: f64 },
    Segment { material_id: Option<i32> },
}

impl NewChild {
    fn parent_kind(&self) -> ContainerKind {
        match self {
            NewChild::Assembly { .. } => ContainerKind::Project,
            NewChild::Layer { .. } => ContainerKind::Assembly,
            NewChild::Segment { .. } => ContainerKind::Layer,
        }
    }
}

async fn insert_child(
    txn: &DatabaseTransaction,
    container: ContainerRef,
    child: &NewChild,
) -> ContainerResult<i32> {
    match child {
        NewChild::Assembly { name, user_id } => {
            let now = chrono::Utc::now();
            let assembly = assemblies::ActiveModel {
                name: Set(name.clone()),
                project_id: Set(container.id),
                user_id: Set(*user_id),
                layer_id_order: Set("[]".to_string()),
                order_version: Set(0),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(txn)
            .await?;
            Ok(assembly.id)
        }
        NewChild::Layer { thickness_mm } => {
            let layer = layers::ActiveModel {
                assembly_id: Set(container.id),
                thickness_mm: Set(*thickness_mm),
                segment_id_order: Set("[]".to_string()),
                order_version: Set(0),
                ..Default::default()
            }
            .insert(txn)
            .await?;
            let segment = layer_segments::ActiveModel {
                layer_id: Set(layer.id),
                material_id: Set(None),
                ..Default::default()
            }
            .insert(txn)
            .await?;
            let layer_ref = ContainerRef::layer(layer.id);
            // Nobody else can see the new layer yet
            if !store_order(txn, layer_ref, &OrderList::new(vec![segment.id]), 0).await? {
                return Err(ContainerError::Contention {
                    kind: layer_ref.kind.name(),
                    id: layer_ref.id,
                    attempts: 1,
                });
            }
            Ok(layer.id)
        }
        NewChild::Segment { material_id } => {
            let segment = layer_segments::ActiveModel {
                layer_id: Set(container.id),
                material_id: Set(*material_id),
                ..Default::default()
            }
            .insert(txn)
            .await?;
            Ok(segment.id)
        }
    }
}

async fn delete_child_row(
    txn: &DatabaseTransaction,
    container: ContainerRef,
    child_id: i32,
) -> ContainerResult<u64> {
    let result = match container.kind {
        ContainerKind::Project => {
            assemblies::Entity::delete_many()
                .filter(assemblies::Column::Id.eq(child_id))
                .filter(assemblies::Column::ProjectId.eq(container.id))
                .exec(txn)
                .await?
        }
        ContainerKind::Assembly => {
            layers::Entity::delete_many()
                .filter(layers::Column::Id.eq(child_id))
                .filter(layers::Column::AssemblyId.eq(container.id))
                .exec(txn)
                .await?
        }
        ContainerKind::Layer => {
            layer_segments::Entity::delete_many()
                .filter(layer_segments::Column::Id.eq(child_id))
                .filter(layer_segments::Column::LayerId.eq(container.id))
                .exec(txn)
                .await?
        }
    };
    Ok(result.rows_affected)
}

/// Run one order-list transaction, retrying on lost compare-and-swap races and
/// on busy/locked errors. `attempt` returns `Ok(None)` after a lost race.
async fn with_retry<T, F, Fut>(container: ContainerRef, mut attempt: F) -> ContainerResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ContainerResult<Option<T>>>,
{
    for round in 1..=MAX_ATTEMPTS {
        match attempt().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => debug!("Order list of {} changed underneath, retry {}", container, round),
            Err(ContainerError::Database(err)) if DbErrorKind::from_db_err(&err).is_retryable() => {
                debug!("Retryable error on {}: {}", container, err);
            }
            Err(err) => return Err(err),
        }
        tokio::time::sleep(RETRY_BACKOFF * round as u32).await;
    }

    warn!("Giving up on order list of {} after {} attempts", container, MAX_ATTEMPTS);
    Err(ContainerError::Contention {
        kind: container.kind.name(),
        id: container.id,
        attempts: MAX_ATTEMPTS,
    })
}

/// Create a child under `container` and append its id, atomically.
pub async fn append_child(
    db: &DatabaseConnection,
    container: ContainerRef,
    child: NewChild,
) -> ContainerResult<i32> {
    if child.parent_kind() != container.kind {
        return Err(ContainerError::Invalid(format!(
            "{} cannot hold a {}",
            container.kind.name(),
            child.parent_kind().child_name()
        )));
    }

    let child = &child;
    let child_id = with_retry(container, move || async move {
        let txn = db.begin().await?;
        let (mut order, version) = load_order(&txn, container).await?;
        let child_id = insert_child(&txn, container, &child).await?;
        order.push(child_id);
        if !store_order(&txn, container, &order, version).await? {
            txn.rollback().await?;
            return Ok(None);
        }
        txn.commit().await?;
        Ok::<_, ContainerError>(Some(child_id))
    })
    .await?;

    info!("Added {} {} to {}", container.kind.child_name(), child_id, container);
    Ok(child_id)
}

/// Create `child` only when the container shows no children yet.
///
/// The emptiness check, the insert and the order-list swap share one
/// transaction, so overlapping callers seed exactly one child. Returns the new
/// id, or `None` when the container already had children.
pub async fn seed_if_empty<M: ChildModel>(
    db: &DatabaseConnection,
    parent_id: i32,
    child: NewChild,
) -> ContainerResult<Option<i32>> {
    let container = ContainerRef { kind: M::PARENT, id: parent_id };
    if child.parent_kind() != container.kind {
        return Err(ContainerError::Invalid(format!(
            "{} cannot hold a {}",
            container.kind.name(),
            child.parent_kind().child_name()
        )));
    }

    let child = &child;
    let seeded = with_retry(container, move || async move {
        let txn = db.begin().await?;
        let (mut order, version) = load_order(&txn, container).await?;
        let rows = M::Entity::find()
            .filter(M::parent_column().eq(parent_id))
            .all(&txn)
            .await?;
        let (children, _) = arrange(&order, rows, M::child_id);
        if !children.is_empty() {
            txn.rollback().await?;
            return Ok(Some(None));
        }

        let child_id = insert_child(&txn, container, child).await?;
        order.push(child_id);
        if !store_order(&txn, container, &order, version).await? {
            txn.rollback().await?;
            return Ok(None);
        }
        txn.commit().await?;
        Ok::<_, ContainerError>(Some(Some(child_id)))
    })
    .await?;

    if let Some(child_id) = seeded {
        info!("Seeded {} {} into empty {}", container.kind.child_name(), child_id, container);
    }
    Ok(seeded)
}

/// Delete a child row and drop its id from the order list, atomically.
///
/// An id that is owned but not listed is simply deleted. An id that does not
/// belong to `container` is not-found.
pub async fn remove_child(
    db: &DatabaseConnection,
    container: ContainerRef,
    child_id: i32,
) -> ContainerResult<()> {
    with_retry(container, move || async move {
        let txn = db.begin().await?;
        let (mut order, version) = load_order(&txn, container).await?;
        if order.remove(child_id) && !store_order(&txn, container, &order, version).await? {
            txn.rollback().await?;
            return Ok(None);
        }
        if delete_child_row(&txn, container, child_id).await? == 0 {
            txn.rollback().await?;
            return Err(ContainerError::not_found(container.kind.child_name(), child_id));
        }
        txn.commit().await?;
        Ok::<_, ContainerError>(Some(()))
    })
    .await?;

    info!("Deleted {} {} from {}", container.kind.child_name(), child_id, container);
    Ok(())
}

/// Swap a listed child with its neighbour. Returns whether anything moved.
pub async fn move_child(
    db: &DatabaseConnection,
    container: ContainerRef,
    child_id: i32,
    direction: MoveDirection,
) -> ContainerResult<bool> {
    with_retry(container, move || async move {
        let txn = db.begin().await?;
        let (mut order, version) = load_order(&txn, container).await?;
        let moved = order
            .move_child(child_id, direction)
            .ok_or(ContainerError::NotListed {
                kind: container.kind.child_name(),
                id: child_id,
            })?;
        if moved && !store_order(&txn, container, &order, version).await? {
            txn.rollback().await?;
            return Ok(None);
        }
        txn.commit().await?;
        Ok::<_, ContainerError>(Some(moved))
    })
    .await
}

/// Repair the order list: drop dangling ids and append unlisted children in
/// id order. Returns the drift that was repaired.
pub async fn reconcile(db: &DatabaseConnection, container: ContainerRef) -> ContainerResult<OrderDrift> {
    let drift = with_retry(container, move || async move {
        let txn = db.begin().await?;
        let (order, version) = load_order(&txn, container).await?;
        let owned = owned_child_ids(&txn, container).await?;
        let (kept, drift) = arrange(&order, owned, |id| *id);

        let mut repaired = OrderList::new(kept);
        for id in &drift.unlisted {
            repaired.push(*id);
        }
        if repaired != order && !store_order(&txn, container, &repaired, version).await? {
            txn.rollback().await?;
            return Ok(None);
        }
        txn.commit().await?;
        Ok::<_, ContainerError>(Some(drift))
    })
    .await?;

    if !drift.is_clean() {
        info!(
            "Reconciled {}: dropped {:?}, appended {:?}",
            container, drift.dangling, drift.unlisted
        );
    }
    Ok(drift)
}

/// Reconcile every container in the database, parents before children.
/// Returns how many containers needed a repair.
pub async fn reconcile_all(db: &DatabaseConnection) -> ContainerResult<usize> {
    let mut containers: Vec<ContainerRef> = Vec::new();
    for project in projects::Entity::find().all(db).await? {
        containers.push(ContainerRef::project(project.id));
    }
    for assembly in assemblies::Entity::find().all(db).await? {
        containers.push(ContainerRef::assembly(assembly.id));
    }
    for layer in layers::Entity::find().all(db).await? {
        containers.push(ContainerRef::layer(layer.id));
    }

    let mut repaired = 0;
    for container in containers {
        if !reconcile(db, container).await?.is_clean() {
            repaired += 1;
        }
    }
    Ok(repaired)
}
