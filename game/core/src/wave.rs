use crate::math::Vec2;
use rand::Rng;

/// One scheduled wave: at `start_time`, a periodic spawner begins emitting
/// `count` monsters of `monster_type`, one every `interval` seconds.
#[derive(Debug, Clone, Copy)]
pub struct WaveDef {
    pub start_time: f32,
    pub monster_type: i32,
    pub count: i32,
    pub interval: f32,
}

/// The stock schedule the demo game runs.
pub fn default_waves() -> Vec<WaveDef> {
    vec![
        WaveDef {
            start_time: 0.0,
            monster_type: 1,
            count: 10,
            interval: 2.0,
        },
        WaveDef {
            start_time: 30.0,
            monster_type: 2,
            count: 15,
            interval: 1.5,
        },
        WaveDef {
            start_time: 60.0,
            monster_type: 1,
            count: 20,
            interval: 1.0,
        },
        WaveDef {
            start_time: 90.0,
            monster_type: 3,
            count: 8,
            interval: 3.0,
        },
    ]
}

#[derive(Debug)]
struct PeriodicSpawner {
    monster_type: i32,
    total: i32,
    spawned: i32,
    interval: f32,
    timer: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct SpawnRequest {
    pub monster_type: i32,
    pub pos: Vec2,
}

/// Spawn placement ring around the arena origin, 5 to 20 units out.
const SPAWN_MIN_DIST: f32 = 5.0;
const SPAWN_MAX_DIST: f32 = 20.0;

/// Time-driven spawner set. Each tick starts every wave whose start time
/// has passed and advances the active spawners; a spawner retires once it
/// has produced its full count.
pub struct WaveManager {
    current_time: f32,
    waves: Vec<WaveDef>,
    next_wave: usize,
    spawners: Vec<PeriodicSpawner>,
}

impl WaveManager {
    pub fn new(waves: Vec<WaveDef>) -> WaveManager {
        WaveManager {
            current_time: 0.0,
            waves,
            next_wave: 0,
            spawners: Vec::new(),
        }
    }

    pub fn start(&mut self) {
        self.current_time = 0.0;
        self.next_wave = 0;
        self.spawners.clear();
    }

    /// All waves started and every spawner retired.
    pub fn finished(&self) -> bool {
        self.next_wave >= self.waves.len() && self.spawners.is_empty()
    }

    /// A room without a schedule never finishes (sandbox rooms).
    pub fn has_schedule(&self) -> bool {
        !self.waves.is_empty()
    }

    pub fn active_spawners(&self) -> usize {
        self.spawners.len()
    }

    pub fn update<R: Rng>(&mut self, dt: f32, rng: &mut R) -> Vec<SpawnRequest> {
        self.current_time += dt;

        while self.next_wave < self.waves.len() && self.current_time >= self.waves[self.next_wave].start_time {
            let wave = self.waves[self.next_wave];
            self.spawners.push(PeriodicSpawner {
                monster_type: wave.monster_type,
                total: wave.count,
                spawned: 0,
                interval: wave.interval,
                // Zero timer: the first monster spawns immediately.
                timer: 0.0,
            });
            self.next_wave += 1;
        }

        let mut requests = Vec::new();

        self.spawners.retain_mut(|spawner| {
            spawner.timer -= dt;
            if spawner.timer <= 0.0 {
                requests.push(SpawnRequest {
                    monster_type: spawner.monster_type,
                    pos: random_ring_position(rng),
                });
                spawner.spawned += 1;
                spawner.timer = spawner.interval;
            }

            spawner.spawned < spawner.total
        });

        requests
    }
}

fn random_ring_position<R: Rng>(rng: &mut R) -> Vec2 {
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let dist = rng.gen_range(SPAWN_MIN_DIST..SPAWN_MAX_DIST);
    Vec2::new(angle.cos() * dist, angle.sin() * dist)
}
