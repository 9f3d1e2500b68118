// ============================================
// Triangulation Scheduler - Фоновая триангуляция
// ============================================
//
// Две фазы:
// 1. compute - в пуле rayon, только чтение снимков полей (Arc)
// 2. apply - на потоке-владельце сетки, apply_completed() / wait_idle()
//
// На чанк не больше одной задачи. Повторный запрос во время работы
// откладывается (deferred) и запускается один раз после применения.
// Если поле чанка или соседа поменялось, пока задача считала,
// результат всё равно применяется, а чанк перезапускается.
// Паника в задаче не теряет результат: чанк остаётся грязным.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::terrain::constants::FORWARD_NEIGHBOR_COUNT;
use crate::terrain::field::ScalarField;
use crate::terrain::grid::ChunkGrid;
use crate::terrain::mesh::{with_meshing_context, ChunkMesh, CubeNeighborhood, MarchingCubes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 0 = по числу ядер (rayon default)
    pub worker_threads: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { worker_threads: 0 }
    }
}

/// Что произошло с запросом
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Задача отправлена в пул
    Started,
    /// У чанка уже есть задача, запрос отложен
    Deferred,
}

/// Снимок полей чанка и его прямых соседей
struct FieldSnapshot {
    field: Arc<ScalarField>,
    neighbors: [Option<Arc<ScalarField>>; FORWARD_NEIGHBOR_COUNT],
    low_edges: [bool; 3],
}

impl FieldSnapshot {
    fn capture(grid: &ChunkGrid, index: u32) -> Option<Self> {
        let chunk = grid.chunk(index)?;
        let mut neighbors: [Option<Arc<ScalarField>>; FORWARD_NEIGHBOR_COUNT] = Default::default();
        for (offset, neighbor) in chunk.forward_neighbors().iter() {
            neighbors[offset.slot()] = neighbor.and_then(|n| grid.chunk(n)).map(|c| c.field_snapshot());
        }
        Some(Self { field: chunk.field_snapshot(), neighbors, low_edges: chunk.low_edges() })
    }

    fn neighborhood(&self) -> CubeNeighborhood<'_> {
        let mut neighbors = [None; FORWARD_NEIGHBOR_COUNT];
        for (slot, n) in self.neighbors.iter().enumerate() {
            neighbors[slot] = n.as_deref();
        }
        CubeNeighborhood { field: &self.field, neighbors, low_edges: self.low_edges }
    }

    /// Все поля в сетке всё ещё те же, что были прочитаны
    fn is_current(&self, grid: &ChunkGrid, index: u32) -> bool {
        let Some(current) = Self::capture(grid, index) else {
            return false;
        };
        Arc::ptr_eq(&self.field, &current.field)
            && self.neighbors.iter().zip(&current.neighbors).all(|pair| match pair {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            })
    }
}

/// Готовый результат compute фазы
struct JobResult {
    index: u32,
    /// None - задача запаниковала
    mesh: Option<ChunkMesh>,
    snapshot: FieldSnapshot,
}

pub struct TriangulationScheduler {
    pool: ThreadPool,
    result_tx: Sender<JobResult>,
    result_rx: Receiver<JobResult>,
    in_flight: usize,
    applied: u64,
    failed: u64,
}

impl TriangulationScheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("triangulation-{}", i))
            .build()?;
        let (result_tx, result_rx) = channel();

        log::debug!("[ASYNC] Пул триангуляции: {} потоков", pool.current_num_threads());

        Ok(Self { pool, result_tx, result_rx, in_flight: 0, applied: 0, failed: 0 })
    }

    /// Задач в работе (ещё не применённых)
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Всего применённых результатов
    #[inline]
    pub fn applied(&self) -> u64 {
        self.applied
    }

    /// Задачи, завершившиеся паникой
    #[inline]
    pub fn failed(&self) -> u64 {
        self.failed
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.in_flight == 0
    }

    /// Запросить триангуляцию чанка; None если индекса нет
    pub fn request(&mut self, grid: &mut ChunkGrid, index: u32) -> Option<Dispatch> {
        let chunk = grid.chunk_mut(index)?;
        if chunk.in_flight {
            chunk.deferred = true;
            log::trace!("[ASYNC] Чанк {} занят, запрос отложен", index);
            return Some(Dispatch::Deferred);
        }
        self.dispatch(grid, index);
        Some(Dispatch::Started)
    }

    fn dispatch(&mut self, grid: &mut ChunkGrid, index: u32) {
        let extractor: MarchingCubes = grid.extractor();
        self.spawn_job(grid, index, move |snapshot| {
            with_meshing_context(|ctx| extractor.extract_with_context(&snapshot.neighborhood(), ctx))
        });
    }

    fn spawn_job<F>(&mut self, grid: &mut ChunkGrid, index: u32, compute: F)
    where
        F: FnOnce(&FieldSnapshot) -> ChunkMesh + Send + 'static,
    {
        let Some(snapshot) = FieldSnapshot::capture(grid, index) else {
            return;
        };
        let Some(chunk) = grid.chunk_mut(index) else {
            return;
        };
        chunk.in_flight = true;
        chunk.deferred = false;
        self.in_flight += 1;

        let tx = self.result_tx.clone();
        self.pool.spawn(move || {
            let mesh = panic::catch_unwind(AssertUnwindSafe(|| compute(&snapshot))).ok();
            // Получатель живёт столько же, сколько планировщик
            let _ = tx.send(JobResult { index, mesh, snapshot });
        });
    }

    fn apply(&mut self, grid: &mut ChunkGrid, result: JobResult) {
        self.in_flight = self.in_flight.saturating_sub(1);

        let stale = !result.snapshot.is_current(grid, result.index);
        let Some(chunk) = grid.chunk_mut(result.index) else {
            return;
        };
        chunk.in_flight = false;

        let Some(mesh) = result.mesh else {
            // Повтор не ставим: тот же снимок упадёт снова
            self.failed += 1;
            chunk.deferred = false;
            chunk.mark_dirty();
            log::error!("[ASYNC] Триангуляция чанка {} завершилась паникой", result.index);
            return;
        };

        self.applied += 1;
        chunk.replace_mesh(mesh);
        if stale {
            chunk.mark_dirty();
            chunk.deferred = true;
        }
        let redo = chunk.deferred;

        log::trace!("[ASYNC] Чанк {} применён{}", result.index, if stale { " (устарел)" } else { "" });

        if redo {
            self.dispatch(grid, result.index);
        }
    }

    /// Применить все готовые результаты; вызывается раз в кадр
    pub fn apply_completed(&mut self, grid: &mut ChunkGrid) -> usize {
        let mut count = 0;
        loop {
            match self.result_rx.try_recv() {
                Ok(result) => {
                    self.apply(grid, result);
                    count += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        count
    }

    /// Блокироваться, пока все задачи (и отложенные) не применены
    pub fn wait_idle(&mut self, grid: &mut ChunkGrid) -> usize {
        let mut count = 0;
        while self.in_flight > 0 {
            match self.result_rx.recv() {
                Ok(result) => {
                    self.apply(grid, result);
                    count += 1;
                }
                Err(_) => break,
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::generation::{GenerationContext, SphereSource};
    use ultraviolet::Vec3;

    fn scheduler() -> TriangulationScheduler {
        TriangulationScheduler::new(SchedulerConfig { worker_threads: 2 }).unwrap()
    }

    fn sphere_grid() -> ChunkGrid {
        let mut grid = ChunkGrid::from_dims(2, 2, 2, 8).unwrap();
        grid.generate_fields(&SphereSource::new(Vec3::new(8.2, 7.7, 8.4), 4.3));
        grid
    }

    #[test]
    fn test_async_matches_sync() {
        let mut sync_grid = sphere_grid();
        sync_grid.triangulate_all();

        let mut async_grid = sphere_grid();
        let mut scheduler = scheduler();
        async_grid.triangulate_all_async(&mut scheduler);
        assert!(async_grid.chunks().iter().all(|c| c.is_triangulating()));
        scheduler.wait_idle(&mut async_grid);

        assert!(scheduler.is_idle());
        assert_eq!(scheduler.applied(), 8);
        for (a, b) in sync_grid.chunks().iter().zip(async_grid.chunks()) {
            assert_eq!(a.mesh(), b.mesh());
            assert!(!b.is_triangulating());
            assert!(!b.needs_triangulation());
        }
    }

    #[test]
    fn test_second_request_is_deferred() {
        let mut grid = sphere_grid();
        let mut scheduler = scheduler();
        assert_eq!(grid.triangulate_async(&mut scheduler, 0), Some(Dispatch::Started));
        assert_eq!(grid.triangulate_async(&mut scheduler, 0), Some(Dispatch::Deferred));
        assert_eq!(grid.triangulate_async(&mut scheduler, 0), Some(Dispatch::Deferred));
        assert_eq!(scheduler.in_flight(), 1);
        assert_eq!(grid.triangulate_async(&mut scheduler, 99), None);

        scheduler.wait_idle(&mut grid);
        // одна задача + одна отложенная, повторы схлопнуты
        assert_eq!(scheduler.applied(), 2);
        assert!(!grid.chunk(0).unwrap().is_triangulating());
    }

    #[test]
    fn test_stale_result_is_recomputed() {
        let mut grid = sphere_grid();
        let mut scheduler = scheduler();
        grid.triangulate_async(&mut scheduler, 0);

        // копия при записи: задача дочитывает старое поле
        grid.set_field(0, ScalarField::filled(8, 0.0)).unwrap().unwrap();
        scheduler.wait_idle(&mut grid);

        assert!(scheduler.applied() >= 2);
        let mut expected = sphere_grid();
        expected.set_field(0, ScalarField::filled(8, 0.0)).unwrap().unwrap();
        expected.triangulate(0);
        assert_eq!(grid.chunk(0).unwrap().mesh(), expected.chunk(0).unwrap().mesh());
    }

    #[test]
    fn test_panicking_job_is_released() {
        let mut grid = sphere_grid();
        let mut scheduler = scheduler();
        scheduler.spawn_job(&mut grid, 0, |_| panic!("extraction failed"));

        assert_eq!(scheduler.wait_idle(&mut grid), 1);
        assert!(scheduler.is_idle());
        assert_eq!(scheduler.failed(), 1);
        assert_eq!(scheduler.applied(), 0);
        let chunk = grid.chunk(0).unwrap();
        assert!(!chunk.is_triangulating());
        assert!(chunk.needs_triangulation());

        // чанк снова можно запросить
        assert_eq!(grid.triangulate_async(&mut scheduler, 0), Some(Dispatch::Started));
        scheduler.wait_idle(&mut grid);
        assert!(!grid.chunk(0).unwrap().needs_triangulation());
    }

    #[test]
    fn test_apply_completed_without_jobs() {
        let mut grid = ChunkGrid::from_dims(1, 1, 1, 4).unwrap();
        grid.generate_fields(&|f: &mut ScalarField, _: &GenerationContext| f.fill(1.0));
        let mut scheduler = scheduler();
        assert_eq!(scheduler.apply_completed(&mut grid), 0);
        assert_eq!(scheduler.wait_idle(&mut grid), 0);
    }
}
