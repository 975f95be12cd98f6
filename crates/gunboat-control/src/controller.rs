//! 连接控制器
//!
//! 维护连接槽位表：槽位 0 为导航，槽位 ≥ 1 为瞄准。断开的槽位置为
//! [`Slot::Empty`] 而不移除，其余连接编号保持不变；新连接优先复用最小的
//! 空槽位。
//!
//! # 并发
//!
//! 槽位表、瞄准连接计数与服务端列表由一把 `parking_lot::Mutex` 保护；
//! 船体与瞄准引擎在接入后不变，放在 `ArcSwapOption` 中无锁读取。
//! 瞄准计算只在锁内读取计数与排名，选择与执行都在锁外进行。

use crate::error::ControlError;
use crate::listener::Listener;
use crate::server::Server;
use arc_swap::ArcSwapOption;
use gunboat_protocol::{
    Boat, BoatError, BoatObserver, ConfigurationError, GestureAction, GestureEvent, Role,
    TargetSelection, TargetingConfig, TargetingEngine, TurretTopology,
};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// 连接槽位
#[derive(Clone, Default)]
pub enum Slot {
    Occupied(Arc<Listener>),
    #[default]
    Empty,
}

impl Slot {
    fn listener(&self) -> Option<&Arc<Listener>> {
        match self {
            Slot::Occupied(listener) => Some(listener),
            Slot::Empty => None,
        }
    }

    fn holds(&self, listener: &Arc<Listener>) -> bool {
        self.listener().is_some_and(|l| Arc::ptr_eq(l, listener))
    }
}

#[derive(Default)]
struct Registry {
    slots: Vec<Slot>,
    /// 在线瞄准连接数（槽位 ≥ 1）
    targets: usize,
    servers: BTreeMap<usize, Arc<Server>>,
    /// 所有启动过的连接，用于关闭时等待线程
    listeners: Vec<Weak<Listener>>,
}

impl Registry {
    fn occupant(&self, id: usize) -> Option<Arc<Listener>> {
        self.slots.get(id).and_then(Slot::listener).cloned()
    }

    /// 占用最小空槽位
    fn claim(&mut self, listener: Arc<Listener>) -> usize {
        let id = match self.slots.iter().position(|s| matches!(s, Slot::Empty)) {
            Some(id) => {
                self.slots[id] = Slot::Occupied(listener);
                id
            },
            None => {
                self.slots.push(Slot::Occupied(listener));
                self.slots.len() - 1
            },
        };
        if id > 0 {
            self.targets += 1;
        }
        id
    }

    fn release(&mut self, id: usize) {
        if let Some(slot) = self.slots.get_mut(id) {
            if matches!(slot, Slot::Occupied(_)) {
                *slot = Slot::Empty;
                if id > 0 {
                    self.targets -= 1;
                }
            }
        }
    }

    /// 释放该连接占用的所有槽位，返回被释放的编号
    fn release_all(&mut self, listener: &Arc<Listener>) -> Vec<usize> {
        let ids: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.holds(listener))
            .map(|(id, _)| id)
            .collect();
        for &id in &ids {
            self.release(id);
        }
        ids
    }

    /// 编号小于 `id` 的在线瞄准连接数
    fn rank(&self, id: usize) -> usize {
        self.slots
            .iter()
            .take(id)
            .skip(1)
            .filter(|slot| matches!(slot, Slot::Occupied(_)))
            .count()
    }
}

struct Attachment {
    boat: Arc<dyn Boat>,
    engine: TargetingEngine,
}

struct Shared {
    registry: Mutex<Registry>,
    attachment: ArcSwapOption<Attachment>,
    observers: RwLock<Vec<Arc<dyn BoatObserver>>>,
    config: TargetingConfig,
    next_server_id: AtomicUsize,
}

/// 连接控制器
///
/// 克隆得到的是同一控制器的句柄，可在任意线程调用。
///
/// # Example
///
/// ```
/// use gunboat_control::ConnectionController;
/// use gunboat_protocol::TargetingConfig;
///
/// let controller = ConnectionController::new(TargetingConfig::default());
/// assert_eq!(controller.targets(), 0);
/// assert!(controller.topology().is_none());
/// controller.shutdown();
/// ```
#[derive(Clone)]
pub struct ConnectionController {
    shared: Arc<Shared>,
}

impl Default for ConnectionController {
    fn default() -> Self {
        Self::new(TargetingConfig::default())
    }
}

impl ConnectionController {
    pub fn new(config: TargetingConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::default()),
                attachment: ArcSwapOption::empty(),
                observers: RwLock::new(Vec::new()),
                config,
                next_server_id: AtomicUsize::new(0),
            }),
        }
    }

    // ==================== 装配 ====================

    /// 接入船体
    ///
    /// 根据炮塔列表确定布局并执行一次炮塔归中。没有炮塔时返回
    /// [`ConfigurationError`]，此时不会接入。
    pub fn attach_boat(&self, boat: Arc<dyn Boat>) -> Result<TurretTopology, ConfigurationError> {
        let engine = TargetingEngine::new(boat.guns(), self.shared.config)?;
        let topology = engine.topology();
        if let Err(e) = boat.center_guns() {
            warn!("Gun centering failed: {}", e);
        }
        info!(
            "Boat attached: {} motors, {} guns, {:?} layout",
            boat.motor_count(),
            engine.guns().len(),
            topology
        );
        self.shared.attachment.store(Some(Arc::new(Attachment {
            boat: boat.clone(),
            engine,
        })));
        for observer in self.shared.observers.read().iter() {
            observer.added(boat.as_ref());
        }
        Ok(topology)
    }

    pub fn add_observer(&self, observer: Arc<dyn BoatObserver>) {
        if let Some(attachment) = self.shared.attachment.load_full() {
            observer.added(attachment.boat.as_ref());
        }
        self.shared.observers.write().push(observer);
    }

    /// 注册并启动一个服务端，返回其编号
    ///
    /// 服务端无法启动时返回错误并注销，控制器继续运行。
    pub fn add_server(&self, server: Arc<Server>) -> Result<usize, ControlError> {
        let id = self.shared.next_server_id.fetch_add(1, Ordering::Relaxed);
        self.shared.registry.lock().servers.insert(id, server.clone());
        if let Err(e) = server.startup(id, self) {
            warn!("Server {} ({}) could not start: {}", id, server.name(), e);
            self.shared.registry.lock().servers.remove(&id);
            return Err(e);
        }
        Ok(id)
    }

    // ==================== 生命周期 ====================

    /// 接受一个新连接，分配最小空闲编号
    ///
    /// 锁内只占用槽位；角色通知在锁外进行，阻塞的对端不影响其他连接。
    pub fn connected(&self, listener: Arc<Listener>) -> Result<usize, ControlError> {
        let id = {
            let mut registry = self.shared.registry.lock();
            let id = registry.claim(listener.clone());
            registry.listeners.retain(|l| l.strong_count() > 0);
            registry.listeners.push(Arc::downgrade(&listener));
            id
        };
        if let Err(e) = listener.startup(id, self) {
            self.release_if_held(id, &listener);
            return Err(e);
        }
        info!(
            "Connection {} from {} as {:?}",
            id,
            listener.peer(),
            Role::from_id(id)
        );
        Ok(id)
    }

    /// 槽位仍由该连接占用时释放
    fn release_if_held(&self, id: usize, listener: &Arc<Listener>) {
        let mut registry = self.shared.registry.lock();
        if registry.slots.get(id).is_some_and(|slot| slot.holds(listener)) {
            registry.release(id);
        }
    }

    /// 释放连接。槽位为空或不存在时什么也不做。
    ///
    /// 同一连接经双击占用的其他槽位一并释放。
    pub fn disconnected(&self, id: usize) {
        let released = {
            let mut registry = self.shared.registry.lock();
            registry
                .occupant(id)
                .map(|listener| (registry.release_all(&listener), listener))
        };
        if let Some((ids, listener)) = released {
            info!("Connection {:?} released ({})", ids, listener.peer());
            listener.shutdown();
        }
    }

    /// 连接线程退出时调用：释放它仍占用的槽位
    pub(crate) fn listener_exited(&self, listener: &Arc<Listener>) {
        let ids = self.shared.registry.lock().release_all(listener);
        if !ids.is_empty() {
            info!("Connection {:?} released ({})", ids, listener.peer());
        }
    }

    /// 服务端线程退出时调用
    pub fn stopping(&self, server_id: usize) {
        if self.shared.registry.lock().servers.remove(&server_id).is_some() {
            info!("Server {} stopped", server_id);
        }
    }

    /// 停止所有服务端，断开所有连接，等待全部线程退出
    pub fn shutdown(&self) {
        let servers: Vec<Arc<Server>> = {
            let mut registry = self.shared.registry.lock();
            std::mem::take(&mut registry.servers).into_values().collect()
        };
        for server in &servers {
            server.shutdown();
        }
        for server in &servers {
            server.join();
        }

        let listeners: Vec<Arc<Listener>> = {
            let mut registry = self.shared.registry.lock();
            registry.slots.clear();
            registry.targets = 0;
            std::mem::take(&mut registry.listeners)
                .iter()
                .filter_map(Weak::upgrade)
                .collect()
        };
        for listener in &listeners {
            listener.shutdown();
        }
        for listener in &listeners {
            listener.join();
        }
        info!(
            "Controller shut down ({} servers, {} connections)",
            servers.len(),
            listeners.len()
        );
    }

    // ==================== 手势路由 ====================

    /// 把一个事件路由到对应动作；船体拒绝的命令只记录日志
    pub fn dispatch(&self, id: usize, event: GestureEvent) {
        debug!(
            "Connection {} {:?} ({:.2}, {:.2})",
            id, event.action, event.x, event.y
        );
        let result = match event.action {
            GestureAction::Press => self.press(id, event.x, event.y),
            GestureAction::Move => self.move_to(id, event.x, event.y),
            GestureAction::Lift => self.lift(id, event.x, event.y),
            GestureAction::Double => {
                self.double(id, event.x, event.y);
                Ok(())
            },
        };
        if let Err(e) = result {
            warn!("Connection {} {:?} rejected: {}", id, event.action, e);
        }
    }

    pub fn press(&self, id: usize, x: f64, y: f64) -> Result<(), BoatError> {
        self.navigate(id, x, y)
    }

    /// 拖动
    pub fn move_to(&self, id: usize, x: f64, y: f64) -> Result<(), BoatError> {
        self.navigate(id, x, y)
    }

    /// 抬起：导航连接总是停船，瞄准连接保持最后位置
    pub fn lift(&self, id: usize, x: f64, y: f64) -> Result<(), BoatError> {
        if id == 0 {
            self.navigate(0, 0.0, 0.0)
        } else {
            self.navigate(id, x, y)
        }
    }

    /// 导航（编号 0）或瞄准（编号 ≥ 1）；成功后向观察者报告船体状态
    pub fn navigate(&self, id: usize, x: f64, y: f64) -> Result<(), BoatError> {
        let Some(attachment) = self.shared.attachment.load_full() else {
            return Ok(());
        };
        if id == 0 {
            attachment.boat.navigate(x, y)?;
        } else {
            self.aim(&attachment, id, x, y)?;
        }
        self.report(&attachment);
        Ok(())
    }

    /// 瞄准
    pub fn target(&self, id: usize, x: f64, y: f64) -> Result<(), BoatError> {
        match self.shared.attachment.load_full() {
            Some(attachment) => self.aim(&attachment, id, x, y),
            None => Ok(()),
        }
    }

    fn aim(&self, attachment: &Attachment, id: usize, x: f64, y: f64) -> Result<(), BoatError> {
        let (active, rank) = {
            let registry = self.shared.registry.lock();
            (registry.targets, registry.rank(id))
        };
        match attachment.engine.select_xy(x, y, active, rank) {
            TargetSelection::Aim { gun, value } => {
                debug!("Connection {} aims gun {} at {:?}", id, gun, value);
                attachment.boat.target(gun, value)
            },
            TargetSelection::Idle => Ok(()),
            TargetSelection::Unsupported { gun } => {
                debug!(
                    "Connection {} would drive gun {}: split control for two targeting connections is not supported",
                    id, gun
                );
                Ok(())
            },
            TargetSelection::Unassigned { gun } => {
                debug!("Connection {} has no gun (rank {})", id, gun);
                Ok(())
            },
        }
    }

    /// 双击：在导航（0）与瞄准（1）之间换位
    ///
    /// 导航连接双击且槽位 1 空闲时，同一连接再占用槽位 1。其他编号忽略。
    pub fn double(&self, id: usize, _x: f64, _y: f64) {
        if id > 1 {
            debug!("Double tap on connection {} ignored", id);
            return;
        }
        let (listener, claimed) = {
            let mut registry = self.shared.registry.lock();
            let Some(listener) = registry.occupant(id) else {
                return;
            };
            let claimed = if id == 0 && registry.occupant(1).is_none() {
                Some(registry.claim(listener.clone()))
            } else {
                None
            };
            (listener, claimed)
        };
        let result = match claimed {
            Some(new_id) => listener
                .startup(new_id, self)
                .inspect_err(|_| self.release_if_held(new_id, &listener)),
            None => listener.startup(1 - id, self),
        };
        match result {
            Ok(()) => info!(
                "Connection {} ({}) switched to {:?}",
                id,
                listener.peer(),
                Role::from_id(listener.id())
            ),
            Err(e) => warn!("Role swap for connection {} failed: {}", id, e),
        }
    }

    fn report(&self, attachment: &Attachment) {
        let observers = self.shared.observers.read();
        if observers.is_empty() {
            return;
        }
        let report = attachment.boat.report();
        for observer in observers.iter() {
            observer.update(&report);
        }
    }

    // ==================== 查询 ====================

    /// 在线瞄准连接数
    pub fn targets(&self) -> usize {
        self.shared.registry.lock().targets
    }

    /// 在线连接编号（升序）
    pub fn live_connections(&self) -> Vec<usize> {
        self.shared
            .registry
            .lock()
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot, Slot::Occupied(_)))
            .map(|(id, _)| id)
            .collect()
    }

    /// 槽位表长度（含空槽位）
    pub fn slot_count(&self) -> usize {
        self.shared.registry.lock().slots.len()
    }

    pub fn server_count(&self) -> usize {
        self.shared.registry.lock().servers.len()
    }

    pub fn topology(&self) -> Option<TurretTopology> {
        self.shared
            .attachment
            .load()
            .as_ref()
            .map(|attachment| attachment.engine.topology())
    }

    pub fn boat(&self) -> Option<Arc<dyn Boat>> {
        self.shared
            .attachment
            .load()
            .as_ref()
            .map(|attachment| attachment.boat.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelClient, ChannelConnector, ChannelSource};
    use crate::transport::ConnectionSource;
    use gunboat_protocol::{BoatReport, GunRange, TargetValue};
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Navigate(f64, f64),
        Target(usize, TargetValue),
    }

    struct RecordingBoat {
        guns: Vec<GunRange>,
        calls: Mutex<Vec<Call>>,
        centred: AtomicUsize,
        fail_navigation: AtomicBool,
    }

    impl RecordingBoat {
        fn new(sizes: &[i32]) -> Arc<Self> {
            Arc::new(Self {
                guns: sizes.iter().map(|&s| GunRange::from_size(s)).collect(),
                calls: Mutex::new(Vec::new()),
                centred: AtomicUsize::new(0),
                fail_navigation: AtomicBool::new(false),
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        fn targets(&self) -> Vec<Call> {
            self.calls()
                .into_iter()
                .filter(|c| matches!(c, Call::Target(..)))
                .collect()
        }
    }

    impl Boat for RecordingBoat {
        fn navigate(&self, x: f64, y: f64) -> Result<(), BoatError> {
            if self.fail_navigation.load(Ordering::Relaxed) {
                return Err(BoatError::Actuator("motor offline".to_string()));
            }
            self.calls.lock().push(Call::Navigate(x, y));
            Ok(())
        }

        fn target(&self, gun: usize, value: TargetValue) -> Result<(), BoatError> {
            self.calls.lock().push(Call::Target(gun, value));
            Ok(())
        }

        fn center_guns(&self) -> Result<(), BoatError> {
            self.centred.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn report(&self) -> BoatReport {
            BoatReport::default()
        }

        fn guns(&self) -> Vec<GunRange> {
            self.guns.clone()
        }

        fn motor_count(&self) -> usize {
            3
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        added: AtomicUsize,
        updates: AtomicUsize,
    }

    impl BoatObserver for CountingObserver {
        fn added(&self, _boat: &dyn Boat) {
            self.added.fetch_add(1, Ordering::Relaxed);
        }

        fn update(&self, _report: &BoatReport) {
            self.updates.fetch_add(1, Ordering::Relaxed);
        }
    }

    struct Harness {
        controller: ConnectionController,
        source: ChannelSource,
        connector: ChannelConnector,
        clients: Vec<ChannelClient>,
    }

    impl Harness {
        fn new() -> Self {
            let (source, connector) = ChannelSource::new();
            Self {
                controller: ConnectionController::default(),
                source,
                connector,
                clients: Vec::new(),
            }
        }

        fn with_boat(sizes: &[i32]) -> (Self, Arc<RecordingBoat>) {
            let harness = Self::new();
            let boat = RecordingBoat::new(sizes);
            harness.controller.attach_boat(boat.clone()).unwrap();
            (harness, boat)
        }

        /// 建立一个连接，返回分配的编号与连接
        fn connect(&mut self) -> (usize, Arc<Listener>) {
            let client = self.connector.connect().unwrap();
            let listener = Listener::new(self.source.accept().unwrap());
            let id = self.controller.connected(listener.clone()).unwrap();
            self.clients.push(client);
            (id, listener)
        }
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            self.controller.shutdown();
        }
    }

    #[test]
    fn test_lowest_free_slot_is_reused() {
        let mut h = Harness::new();
        assert_eq!(h.connect().0, 0);
        assert_eq!(h.connect().0, 1);
        assert_eq!(h.connect().0, 2);
        assert_eq!(h.controller.targets(), 2);

        h.controller.disconnected(1);
        assert_eq!(h.controller.live_connections(), vec![0, 2]);
        assert_eq!(h.controller.targets(), 1);
        assert_eq!(h.controller.slot_count(), 3);

        assert_eq!(h.connect().0, 1);
        assert_eq!(h.controller.targets(), 2);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mut h = Harness::new();
        h.connect();
        let (id, listener) = h.connect();
        h.controller.disconnected(id);
        h.controller.disconnected(id);
        h.controller.disconnected(42);
        assert_eq!(h.controller.live_connections(), vec![0]);
        assert_eq!(h.controller.targets(), 0);
        assert!(!listener.is_running());
    }

    #[test]
    fn test_attach_derives_topology_and_centres_guns() {
        let (h, boat) = Harness::with_boat(&[8, 8, 8, 8]);
        assert_eq!(h.controller.topology(), Some(TurretTopology::Square));
        assert_eq!(boat.centred.load(Ordering::Relaxed), 1);
        assert!(h.controller.boat().is_some());
    }

    #[test]
    fn test_attach_rejects_boat_without_guns() {
        let h = Harness::new();
        let result = h.controller.attach_boat(RecordingBoat::new(&[]));
        assert_eq!(result, Err(ConfigurationError::NoGuns));
        assert!(h.controller.topology().is_none());
    }

    #[test]
    fn test_routing_without_boat_is_noop() {
        let mut h = Harness::new();
        h.connect();
        assert!(h.controller.press(0, 0.5, 0.5).is_ok());
        assert!(h.controller.target(1, 0.0, 0.9).is_ok());
    }

    #[test]
    fn test_navigation_and_lift_stop() {
        let (mut h, boat) = Harness::with_boat(&[8, 8, 8, 8]);
        h.connect();
        h.controller.press(0, 0.3, 0.8).unwrap();
        h.controller.move_to(0, 0.4, 0.6).unwrap();
        h.controller.lift(0, 0.5, 0.5).unwrap();
        assert_eq!(
            boat.calls(),
            vec![
                Call::Navigate(0.3, 0.8),
                Call::Navigate(0.4, 0.6),
                Call::Navigate(0.0, 0.0)
            ]
        );
    }

    #[test]
    fn test_single_target_drives_square_sector() {
        let (mut h, boat) = Harness::with_boat(&[-4, -4, -4, -4]);
        h.connect();
        h.connect();
        assert_eq!(h.controller.targets(), 1);

        h.controller.press(1, 0.0, 0.9).unwrap();
        let calls = boat.targets();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            Call::Target(gun, TargetValue::Step(step)) => {
                assert_eq!(*gun, 3);
                assert!(GunRange::from_size(-4).contains(*step));
            },
            other => panic!("unexpected call {:?}", other),
        }

        // 抬起保持最后位置：同样作为一次瞄准
        h.controller.lift(1, 0.9, 0.0).unwrap();
        assert_eq!(boat.targets().len(), 2);
    }

    #[test]
    fn test_dead_zone_is_ignored() {
        let (mut h, boat) = Harness::with_boat(&[8, 8, 8, 8]);
        h.connect();
        h.connect();
        h.controller.press(1, 0.1, 0.2).unwrap();
        assert!(boat.targets().is_empty());
    }

    #[test]
    fn test_two_targets_do_not_aim() {
        let (mut h, boat) = Harness::with_boat(&[8, 8, 8, 8]);
        for _ in 0..3 {
            h.connect();
        }
        assert_eq!(h.controller.targets(), 2);
        h.controller.press(1, 0.0, 0.9).unwrap();
        h.controller.press(2, 0.9, 0.0).unwrap();
        assert!(boat.targets().is_empty());
    }

    #[test]
    fn test_many_targets_map_by_live_rank() {
        let (mut h, boat) = Harness::with_boat(&[8, 8, 8]);
        for _ in 0..5 {
            h.connect();
        }
        assert_eq!(h.controller.targets(), 4);

        h.controller.disconnected(1);
        assert_eq!(h.controller.targets(), 3);

        // 编号 3 之前只剩编号 2 在线，因此驱动炮塔 1
        h.controller.press(3, 0.9, 0.0).unwrap();
        // 编号 4 排名 2
        h.controller.press(4, 0.0, -0.9).unwrap();
        assert_eq!(
            boat.targets(),
            vec![
                Call::Target(1, TargetValue::Angle(0.25)),
                Call::Target(2, TargetValue::Angle(0.5)),
            ]
        );
    }

    #[test]
    fn test_double_tap_synthesizes_second_role() {
        let mut h = Harness::new();
        let (id, listener) = h.connect();
        assert_eq!(id, 0);

        h.controller.double(0, 0.0, 0.0);
        assert_eq!(listener.id(), 1);
        assert_eq!(h.controller.live_connections(), vec![0, 1]);
        assert_eq!(h.controller.targets(), 1);

        h.controller.double(1, 0.0, 0.0);
        assert_eq!(listener.id(), 0);

        let client = &h.clients[0];
        let wait = Duration::from_secs(1);
        assert_eq!(client.wait_role(wait), Some(Role::Navigate));
        assert_eq!(client.wait_role(wait), Some(Role::Target(1)));
        assert_eq!(client.wait_role(wait), Some(Role::Navigate));

        // 断开时两个槽位一起释放
        h.controller.disconnected(0);
        assert!(h.controller.live_connections().is_empty());
        assert_eq!(h.controller.targets(), 0);
    }

    #[test]
    fn test_double_tap_rebinds_when_target_is_live() {
        let mut h = Harness::new();
        let (_, navigator) = h.connect();
        let (_, gunner) = h.connect();

        h.controller.double(0, 0.0, 0.0);
        assert_eq!(navigator.id(), 1);
        assert_eq!(gunner.id(), 1);
        assert_eq!(h.controller.slot_count(), 2);
    }

    #[test]
    fn test_double_tap_ignored_for_other_ids_and_empty_slots() {
        let mut h = Harness::new();
        h.controller.double(0, 0.0, 0.0);
        assert_eq!(h.controller.slot_count(), 0);

        for _ in 0..3 {
            h.connect();
        }
        let before = h.controller.live_connections();
        h.controller.double(2, 0.0, 0.0);
        h.controller.double(9, 0.0, 0.0);
        assert_eq!(h.controller.live_connections(), before);
    }

    #[test]
    fn test_observers_see_successful_navigation_only() {
        let h = Harness::new();
        let observer = Arc::new(CountingObserver::default());
        h.controller.add_observer(observer.clone());
        assert_eq!(observer.added.load(Ordering::Relaxed), 0);

        let boat = RecordingBoat::new(&[8, 8, 8, 8]);
        h.controller.attach_boat(boat.clone()).unwrap();
        assert_eq!(observer.added.load(Ordering::Relaxed), 1);

        h.controller.navigate(0, 0.0, 0.5).unwrap();
        assert_eq!(observer.updates.load(Ordering::Relaxed), 1);

        boat.fail_navigation.store(true, Ordering::Relaxed);
        assert!(h.controller.navigate(0, 0.0, 0.5).is_err());
        assert_eq!(observer.updates.load(Ordering::Relaxed), 1);

        let late = Arc::new(CountingObserver::default());
        h.controller.add_observer(late.clone());
        assert_eq!(late.added.load(Ordering::Relaxed), 1);
    }

    /// 角色通知阻塞到放行为止的连接
    struct StalledDecoder {
        entered: crossbeam_channel::Sender<()>,
        release: crossbeam_channel::Receiver<()>,
        wake_tx: crossbeam_channel::Sender<()>,
        wake_rx: crossbeam_channel::Receiver<()>,
    }

    impl crate::transport::EventDecoder for StalledDecoder {
        fn next_event(&self) -> Result<Option<GestureEvent>, ControlError> {
            let _ = self.wake_rx.recv();
            Ok(None)
        }

        fn on_role(&self, _role: Role) -> Result<(), ControlError> {
            let _ = self.entered.send(());
            let _ = self.release.recv_timeout(Duration::from_secs(5));
            Ok(())
        }

        fn interrupter(&self) -> crate::transport::Interrupter {
            let wake = self.wake_tx.clone();
            crate::transport::Interrupter::new(move || {
                let _ = wake.try_send(());
            })
        }

        fn peer(&self) -> String {
            "stalled".to_string()
        }
    }

    #[test]
    fn test_stalled_role_write_does_not_block_controller() {
        let (h, boat) = Harness::with_boat(&[8, 8, 8, 8]);
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);
        let listener = Listener::new(Box::new(StalledDecoder {
            entered: entered_tx,
            release: release_rx,
            wake_tx,
            wake_rx,
        }));

        let controller = h.controller.clone();
        let stalled = listener.clone();
        let connecting = std::thread::spawn(move || controller.connected(stalled));
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // 对端卡住时其他调用照常完成
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let controller = h.controller.clone();
        std::thread::spawn(move || {
            let targets = controller.targets();
            let lifted = controller.lift(0, 0.0, 0.0).is_ok();
            let _ = done_tx.send((targets, lifted));
        });
        assert_eq!(
            done_rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            (0, true)
        );
        assert_eq!(boat.calls(), vec![Call::Navigate(0.0, 0.0)]);

        release_tx.send(()).unwrap();
        assert_eq!(connecting.join().unwrap().unwrap(), 0);
        assert_eq!(h.controller.live_connections(), vec![0]);
    }

    #[test]
    fn test_startup_after_shutdown_is_refused() {
        let mut h = Harness::new();
        let (id, listener) = h.connect();
        listener.shutdown();
        assert!(matches!(
            listener.startup(id, &h.controller),
            Err(ControlError::ConnectionFault(_))
        ));
        assert!(!listener.is_running());
    }

    #[test]
    fn test_failed_server_is_unregistered() {
        struct DeadSource;

        impl ConnectionSource for DeadSource {
            fn open(&self) -> Result<(), ControlError> {
                Err(ControlError::NoReceiver("no adapter".to_string()))
            }

            fn accept(&self) -> Result<Box<dyn crate::transport::EventDecoder>, ControlError> {
                Err(ControlError::NoReceiver("no adapter".to_string()))
            }

            fn interrupter(&self) -> crate::transport::Interrupter {
                crate::transport::Interrupter::new(|| {})
            }

            fn name(&self) -> String {
                "dead".to_string()
            }
        }

        let h = Harness::new();
        let result = h.controller.add_server(Server::new(DeadSource));
        assert!(matches!(result, Err(ControlError::NoReceiver(_))));
        assert_eq!(h.controller.server_count(), 0);
    }
}
