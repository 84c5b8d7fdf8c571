// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-ExcalidrawTabs-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of excalidraw-tabs and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rstest::{fixture, rstest};
use tokio::sync::Notify;

use super::{TabCoordinator, TabStatus};
use crate::model::{DiagramData, DiagramId, StoredDiagram, Tab, TabSession, VersionId};
use crate::store::test_support::{did, scene, TempDir};
use crate::store::{DiagramStore, StoreConfig, StoreError};
use crate::tabs::{DiagramRepository, EditingSurface, MemorySurface};

/// Delegates to a real store but can hold back reads of one document until released.
struct GatedRepository {
    store: DiagramStore,
    held: Mutex<Option<DiagramId>>,
    released: Notify,
    reads: AtomicUsize,
}

impl GatedRepository {
    fn hold(&self, id: &DiagramId) {
        *self.held.lock().unwrap() = Some(id.clone());
    }

    fn release(&self) {
        self.held.lock().unwrap().take();
        self.released.notify_waiters();
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiagramRepository for GatedRepository {
    async fn get(&self, id: &DiagramId) -> Result<Option<StoredDiagram>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let held = self.held.lock().unwrap().as_ref() == Some(id);
        if held {
            self.released.notified().await;
        }
        self.store.get(id).await
    }

    async fn create(&self, name: Option<&str>) -> Result<StoredDiagram, StoreError> {
        self.store.create(name).await
    }

    fn save(&self, id: &DiagramId, data: DiagramData) {
        DiagramRepository::save(&self.store, id, data);
    }

    async fn save_immediate(&self, id: &DiagramId, data: DiagramData) -> Result<(), StoreError> {
        self.store.save_immediate(id, data).await
    }

    async fn cancel_pending_save(&self, id: &DiagramId) {
        self.store.cancel_pending_save(id).await;
    }

    async fn flush_save(&self, id: &DiagramId) {
        DiagramRepository::flush_save(&self.store, id).await;
    }

    async fn rename(&self, id: &DiagramId, name: &str) -> Result<(), StoreError> {
        self.store.rename(id, name).await
    }

    async fn restore_version(
        &self,
        id: &DiagramId,
        version_id: &VersionId,
    ) -> Result<Option<DiagramData>, StoreError> {
        self.store.restore_version(id, version_id).await
    }

    async fn regenerate_thumbnail(
        &self,
        id: &DiagramId,
        data: &DiagramData,
    ) -> Result<(), StoreError> {
        self.store.regenerate_thumbnail(id, data).await
    }

    async fn load_tab_session(&self) -> Result<TabSession, StoreError> {
        self.store.load_tab_session().await
    }

    async fn store_tab_session(&self, session: &TabSession) -> Result<(), StoreError> {
        self.store.store_tab_session(session).await
    }
}

struct TabsTestCtx {
    _tmp: TempDir,
    store: DiagramStore,
    tabs: TabCoordinator<GatedRepository, MemorySurface>,
}

impl TabsTestCtx {
    fn new(prefix: &str) -> Self {
        let tmp = TempDir::new(prefix);
        let config = StoreConfig::default()
            .with_save_debounce(Duration::from_millis(300))
            .with_thumbnail_debounce(Duration::from_millis(3000));
        let store = DiagramStore::open(tmp.path().join("store"), config);
        let repository = GatedRepository {
            store: store.clone(),
            held: Mutex::new(None),
            released: Notify::new(),
            reads: AtomicUsize::new(0),
        };
        Self {
            _tmp: tmp,
            store,
            tabs: TabCoordinator::new(repository, MemorySurface::new()),
        }
    }

    async fn document(&self, name: &str, elements: usize) -> DiagramId {
        let diagram = self.store.create(Some(name)).await.unwrap();
        self.store
            .save_immediate(&diagram.id, scene(elements))
            .await
            .unwrap();
        diagram.id
    }

    /// Persists `ids` as the open tabs and restores them into the coordinator.
    async fn reopen(&self, ids: &[&DiagramId], active: &DiagramId) {
        let session = TabSession {
            open_tabs: ids.iter().map(|id| Tab::new((*id).clone(), id.as_str())).collect(),
            active_tab_id: Some(active.clone()),
        };
        self.store.store_tab_session(&session).await.unwrap();
        assert_eq!(self.tabs.restore_session().await.unwrap(), Some(active.clone()));
    }

    /// Draws `data` on the surface and reports it the way the editor would.
    fn draw(&self, data: DiagramData) -> bool {
        self.tabs.with_surface(|surface| surface.edit(data.clone()));
        self.tabs.on_change(data.elements, data.app_state, data.files)
    }

    fn surface_elements(&self) -> usize {
        self.tabs.with_surface(|surface| surface.scene().element_count())
    }

    async fn stored_elements(&self, id: &DiagramId) -> usize {
        self.store.get(id).await.unwrap().unwrap().data.element_count()
    }

    fn tab_ids(&self) -> Vec<DiagramId> {
        self.tabs.tabs().into_iter().map(|tab| tab.id).collect()
    }
}

#[fixture]
fn ctx() -> TabsTestCtx {
    TabsTestCtx::new("tabs")
}

#[rstest]
#[tokio::test]
async fn change_during_load_is_dropped_and_reaches_no_document(ctx: TabsTestCtx) {
    let a = ctx.document("A", 1).await;
    let b = ctx.document("B", 2).await;
    ctx.reopen(&[&a, &b], &a).await;
    ctx.tabs.repository().hold(&b);

    let switch = ctx.tabs.switch_tab(&b);
    let probe = async {
        while ctx.tabs.tab_status(&b) != TabStatus::Loading {
            tokio::task::yield_now().await;
        }
        assert_eq!(ctx.tabs.active_tab_id(), Some(b.clone()));
        assert_eq!(ctx.tabs.loaded_tab_id(), None);
        assert!(!ctx.draw(scene(9)));
        assert_eq!(ctx.tabs.tab_status(&a), TabStatus::Unloaded);
        ctx.tabs.repository().release();
    };
    let (switched, ()) = tokio::join!(switch, probe);
    switched.unwrap();

    assert_eq!(ctx.tabs.loaded_tab_id(), Some(b.clone()));
    assert_eq!(ctx.surface_elements(), 2);
    assert!(!ctx.tabs.is_dirty(&b));

    ctx.tabs.flush_pending().await;
    assert_eq!(ctx.stored_elements(&a).await, 1);
    assert_eq!(ctx.stored_elements(&b).await, 2);
}

#[rstest]
#[tokio::test]
async fn superseded_load_is_abandoned(ctx: TabsTestCtx) {
    let a = ctx.document("A", 1).await;
    let b = ctx.document("B", 2).await;
    ctx.reopen(&[&a, &b], &a).await;
    ctx.tabs.repository().hold(&b);

    let slow = ctx.tabs.switch_tab(&b);
    let fast = async {
        while ctx.tabs.tab_status(&b) != TabStatus::Loading {
            tokio::task::yield_now().await;
        }
        ctx.tabs.switch_tab(&a).await.unwrap();
        ctx.tabs.repository().release();
    };
    let (slow, ()) = tokio::join!(slow, fast);
    slow.unwrap();

    assert_eq!(ctx.tabs.active_tab_id(), Some(a.clone()));
    assert_eq!(ctx.tabs.loaded_tab_id(), Some(a.clone()));
    assert_eq!(ctx.tabs.tab_status(&b), TabStatus::Unloaded);
    assert_eq!(ctx.surface_elements(), 1);
    assert!(ctx.tabs.cached(&b).is_none());
}

#[rstest]
#[tokio::test]
async fn switching_back_is_served_from_the_cache(ctx: TabsTestCtx) {
    let a = ctx.document("A", 1).await;
    let b = ctx.document("B", 2).await;
    ctx.reopen(&[&a, &b], &a).await;
    let baseline = ctx.tabs.repository().reads();

    ctx.tabs.switch_tab(&b).await.unwrap();
    assert_eq!(ctx.tabs.repository().reads(), baseline + 1);

    ctx.tabs.switch_tab(&a).await.unwrap();
    assert_eq!(ctx.tabs.repository().reads(), baseline + 1);
    assert_eq!(ctx.surface_elements(), 1);
}

#[rstest]
#[tokio::test]
async fn switching_writes_the_outgoing_tab_first(ctx: TabsTestCtx) {
    let a = ctx.document("A", 1).await;
    let b = ctx.document("B", 2).await;
    ctx.reopen(&[&a, &b], &a).await;

    ctx.tabs.with_surface(|surface| surface.edit(scene(3)));
    ctx.tabs.switch_tab(&b).await.unwrap();
    assert_eq!(ctx.stored_elements(&a).await, 3);
    assert_eq!(ctx.tabs.cached(&a).map(|data| data.element_count()), Some(3));

    assert!(ctx.draw(scene(6)));
    ctx.tabs.flush_pending().await;
    assert_eq!(ctx.stored_elements(&a).await, 3);
    assert_eq!(ctx.stored_elements(&b).await, 6);
}

#[rstest]
#[tokio::test]
async fn switching_to_a_loaded_tab_is_a_no_op(ctx: TabsTestCtx) {
    let a = ctx.document("A", 1).await;
    ctx.reopen(&[&a], &a).await;
    let loads = ctx.tabs.with_surface(|surface| surface.loads());

    ctx.tabs.switch_tab(&a).await.unwrap();
    assert_eq!(ctx.tabs.with_surface(|surface| surface.loads()), loads);
}

#[rstest]
#[tokio::test]
async fn switching_to_an_unopened_document_opens_a_tab(ctx: TabsTestCtx) {
    let a = ctx.document("A", 1).await;
    let b = ctx.document("B", 2).await;
    ctx.reopen(&[&a], &a).await;

    ctx.tabs.switch_tab(&b).await.unwrap();
    assert_eq!(ctx.tab_ids(), vec![a, b.clone()]);
    assert_eq!(ctx.tabs.tabs()[1].name, "B");
    assert_eq!(ctx.tabs.loaded_tab_id(), Some(b));
}

#[rstest]
#[tokio::test]
async fn switching_to_an_unknown_document_fails_without_side_effects(ctx: TabsTestCtx) {
    let a = ctx.document("A", 1).await;
    ctx.reopen(&[&a], &a).await;

    let err = ctx.tabs.switch_tab(&did("missing")).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(ctx.tab_ids(), vec![a.clone()]);
    assert_eq!(ctx.tabs.loaded_tab_id(), Some(a));
}

#[rstest]
#[tokio::test]
async fn closing_the_active_tab_activates_its_neighbour(ctx: TabsTestCtx) {
    let a = ctx.document("A", 1).await;
    let b = ctx.document("B", 2).await;
    let c = ctx.document("C", 3).await;
    ctx.reopen(&[&a, &b, &c], &b).await;

    ctx.tabs.close_tab(&b).await.unwrap();
    assert_eq!(ctx.tab_ids(), vec![a.clone(), c.clone()]);
    assert_eq!(ctx.tabs.loaded_tab_id(), Some(c.clone()));
    assert_eq!(ctx.surface_elements(), 3);
    assert!(ctx.tabs.cached(&b).is_none());
    let persisted = ctx.store.load_tab_session().await.unwrap();
    assert_eq!(persisted.active_tab_id, Some(c.clone()));

    ctx.tabs.close_tab(&c).await.unwrap();
    assert_eq!(ctx.tabs.loaded_tab_id(), Some(a.clone()));

    ctx.tabs.close_tab(&a).await.unwrap();
    assert!(ctx.tab_ids().is_empty());
    assert_eq!(ctx.tabs.active_tab_id(), None);
    assert_eq!(ctx.tabs.loaded_tab_id(), None);
    assert_eq!(ctx.surface_elements(), 0);
    assert!(!ctx.draw(scene(1)));
}

#[rstest]
#[tokio::test]
async fn closing_saves_the_loaded_document(ctx: TabsTestCtx) {
    let a = ctx.document("A", 1).await;
    let b = ctx.document("B", 2).await;
    ctx.reopen(&[&a, &b], &a).await;

    ctx.tabs.with_surface(|surface| surface.edit(scene(5)));
    ctx.tabs.close_tab(&a).await.unwrap();
    assert_eq!(ctx.stored_elements(&a).await, 5);
    assert_eq!(ctx.tabs.loaded_tab_id(), Some(b));
}

#[rstest]
#[tokio::test]
async fn closing_an_inactive_tab_keeps_the_loaded_one(ctx: TabsTestCtx) {
    let a = ctx.document("A", 1).await;
    let b = ctx.document("B", 2).await;
    ctx.reopen(&[&a, &b], &a).await;
    let loads = ctx.tabs.with_surface(|surface| surface.loads());

    ctx.tabs.close_tab(&b).await.unwrap();
    assert_eq!(ctx.tab_ids(), vec![a.clone()]);
    assert_eq!(ctx.tabs.loaded_tab_id(), Some(a));
    assert_eq!(ctx.tabs.with_surface(|surface| surface.loads()), loads);

    ctx.tabs.close_tab(&did("never-opened")).await.unwrap();
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn autosave_keeps_the_tab_dirty_until_an_explicit_save(ctx: TabsTestCtx) {
    let a = ctx.document("A", 1).await;
    ctx.reopen(&[&a], &a).await;
    assert_eq!(ctx.tabs.tab_status(&a), TabStatus::Loaded);

    assert!(ctx.draw(scene(4)));
    assert_eq!(ctx.tabs.tab_status(&a), TabStatus::Dirty);
    assert!(ctx.tabs.tabs()[0].is_dirty);
    assert_eq!(ctx.stored_elements(&a).await, 1);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(ctx.stored_elements(&a).await, 4);
    assert!(ctx.tabs.is_dirty(&a));
    let entry = ctx.store.index().await.unwrap().remove(0);
    assert!(entry.thumbnail.is_none());

    ctx.tabs.save_current_tab().await.unwrap();
    assert!(!ctx.tabs.is_dirty(&a));
    assert!(!ctx.tabs.tabs()[0].is_dirty);
    assert_eq!(ctx.tabs.tab_status(&a), TabStatus::Loaded);
    let entry = ctx.store.index().await.unwrap().remove(0);
    assert!(entry.thumbnail.is_some());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn switching_away_refreshes_the_thumbnail(ctx: TabsTestCtx) {
    let a = ctx.document("A", 1).await;
    let b = ctx.document("B", 1).await;
    ctx.reopen(&[&a, &b], &a).await;

    assert!(ctx.draw(scene(2)));
    tokio::time::sleep(Duration::from_millis(500)).await;
    ctx.tabs.switch_tab(&b).await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let index = ctx.store.index().await.unwrap();
    let entry = index.iter().find(|entry| entry.id == a).unwrap();
    assert_eq!(entry.element_count, 2);
    assert!(entry.thumbnail.is_some());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn closing_a_tab_refreshes_its_thumbnail(ctx: TabsTestCtx) {
    let a = ctx.document("A", 1).await;
    let b = ctx.document("B", 1).await;
    ctx.reopen(&[&a, &b], &a).await;

    assert!(ctx.draw(scene(3)));
    ctx.tabs.close_tab(&a).await.unwrap();

    let index = ctx.store.index().await.unwrap();
    let entry = index.iter().find(|entry| entry.id == a).unwrap();
    assert_eq!(entry.element_count, 3);
    assert!(entry.thumbnail.is_some());
}

#[rstest]
#[tokio::test]
async fn changes_without_a_loaded_document_are_dropped(ctx: TabsTestCtx) {
    let a = ctx.document("A", 1).await;

    assert!(!ctx.draw(scene(3)));
    assert!(!ctx.store.has_pending_save(&a));
    ctx.tabs.save_current_tab().await.unwrap();
    assert_eq!(ctx.stored_elements(&a).await, 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn restoring_a_version_replaces_the_surface_and_drops_pending_saves(ctx: TabsTestCtx) {
    let a = ctx.document("A", 1).await;
    ctx.reopen(&[&a], &a).await;
    let version = ctx.store.save_version(&a, "two", &scene(2)).await.unwrap();

    assert!(ctx.draw(scene(5)));
    let restored = ctx.tabs.restore_version(&version.id).await.unwrap();
    assert_eq!(restored, Some(scene(2)));
    assert_eq!(ctx.surface_elements(), 2);
    assert_eq!(ctx.tabs.cached(&a), Some(scene(2)));
    assert!(!ctx.tabs.is_dirty(&a));

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(ctx.stored_elements(&a).await, 2);
}

#[rstest]
#[tokio::test]
async fn restoring_an_unknown_version_leaves_the_surface(ctx: TabsTestCtx) {
    let a = ctx.document("A", 3).await;
    ctx.reopen(&[&a], &a).await;

    let unknown = VersionId::new("nope").unwrap();
    assert_eq!(ctx.tabs.restore_version(&unknown).await.unwrap(), None);
    assert_eq!(ctx.surface_elements(), 3);
}

#[rstest]
#[tokio::test]
async fn restoring_the_session_drops_deleted_documents(ctx: TabsTestCtx) {
    let a = ctx.document("A", 1).await;
    let b = ctx.document("B", 2).await;
    let session = TabSession {
        open_tabs: vec![
            Tab::new(a.clone(), "stale name"),
            Tab::new(did("gone"), "Gone"),
            Tab {
                is_dirty: true,
                ..Tab::new(b.clone(), "B")
            },
        ],
        active_tab_id: Some(did("gone")),
    };
    ctx.store.store_tab_session(&session).await.unwrap();

    let active = ctx.tabs.restore_session().await.unwrap();
    assert_eq!(active, Some(a.clone()));
    assert_eq!(ctx.tab_ids(), vec![a.clone(), b.clone()]);
    assert_eq!(ctx.tabs.tabs()[0].name, "A");
    assert!(ctx.tabs.is_dirty(&b));
    assert_eq!(ctx.tabs.loaded_tab_id(), Some(a));
    assert_eq!(ctx.surface_elements(), 1);
}

#[rstest]
#[tokio::test]
async fn restoring_an_empty_session_binds_nothing(ctx: TabsTestCtx) {
    assert_eq!(ctx.tabs.restore_session().await.unwrap(), None);
    assert_eq!(ctx.tabs.loaded_tab_id(), None);
    assert!(ctx.tab_ids().is_empty());
}

#[rstest]
#[tokio::test]
async fn open_new_tab_creates_and_activates_a_document(ctx: TabsTestCtx) {
    let a = ctx.document("A", 1).await;
    ctx.reopen(&[&a], &a).await;

    let fresh = ctx.tabs.open_new_tab(Some("Fresh")).await.unwrap();
    assert_eq!(ctx.tab_ids(), vec![a, fresh.clone()]);
    assert_eq!(ctx.tabs.loaded_tab_id(), Some(fresh.clone()));
    assert_eq!(ctx.surface_elements(), 0);
    assert_eq!(ctx.store.get(&fresh).await.unwrap().unwrap().name, "Fresh");

    let persisted = ctx.store.load_tab_session().await.unwrap();
    assert_eq!(persisted.active_tab_id, Some(fresh));
    assert_eq!(persisted.open_tabs.len(), 2);
}

#[rstest]
#[tokio::test]
async fn rename_tab_updates_tab_and_document(ctx: TabsTestCtx) {
    let a = ctx.document("A", 1).await;
    ctx.reopen(&[&a], &a).await;

    ctx.tabs.rename_tab(&a, "Renamed").await.unwrap();
    assert_eq!(ctx.tabs.tabs()[0].name, "Renamed");
    assert_eq!(ctx.store.get(&a).await.unwrap().unwrap().name, "Renamed");
    let persisted = ctx.store.load_tab_session().await.unwrap();
    assert_eq!(persisted.open_tabs[0].name, "Renamed");
    assert!(ctx.tabs.session_warning().is_none());
}
