//! Demo scripts and the simulated natives they call

use scripthost::domain::{ScriptDescriptor, ScriptRegistry};
use scripthost::memory::joaat;
use scripthost::native::{CallArgs, HandleObject, NativeArg, Ped, SimulatedHost, Vector3, Vehicle, NO_ARGS};
use scripthost::script::{KeyEvent, Keys, Script, ScriptContext, ScriptResult};
use std::time::{Duration, Instant};

pub const GET_GAME_TIMER: u64 = 0x9CD2_7B0C_5DA3_C8B4;
pub const PLAYER_PED_ID: u64 = 0xD809_58FC_74E9_88A6;
pub const GET_ENTITY_COORDS: u64 = 0x3FEF_770D_4096_0D5A;
pub const GET_HASH_KEY: u64 = 0xD24D_37CC_2759_48CC;
pub const CREATE_VEHICLE: u64 = 0xAF35_D0D2_5830_51B0;
pub const SHOW_NOTIFICATION: u64 = 0x2ED7_843F_8F80_1023;

/// A host with just enough natives for the demo scripts
pub fn simulated_host() -> SimulatedHost {
    let started = Instant::now();
    let mut next_vehicle: i32 = 0x100;

    SimulatedHost::new()
        .with_native(GET_GAME_TIMER, move |_: &CallArgs| {
            started.elapsed().as_millis() as u32
        })
        .with_native(PLAYER_PED_ID, |_: &CallArgs| 1i32)
        .with_native(GET_ENTITY_COORDS, |args: &CallArgs| {
            let seed = args.int(0) as f32;
            Vector3::new(-74.9 + seed, -818.6, 326.2)
        })
        .with_native(GET_HASH_KEY, |args: &CallArgs| {
            // SAFETY: argument 0 is a pinned string for the duration of the call
            joaat(&unsafe { args.c_str(0) })
        })
        .with_native(CREATE_VEHICLE, move |args: &CallArgs| {
            next_vehicle += 1;
            tracing::info!(
                model = format_args!("{:#010x}", args.uint(0)),
                x = args.float(1),
                y = args.float(2),
                z = args.float(3),
                "vehicle created"
            );
            next_vehicle
        })
        .with_native(SHOW_NOTIFICATION, |args: &CallArgs| {
            // SAFETY: as above
            let text = unsafe { args.c_str(0) };
            println!("[notification] {}", text);
        })
}

/// Logs the host clock on a one-second interval
#[derive(Default)]
pub struct Clock {
    ticks: u32,
}

impl Script for Clock {
    fn on_start(&mut self, ctx: &mut ScriptContext) -> ScriptResult {
        ctx.set_interval(1000);
        Ok(())
    }

    fn on_tick(&mut self, ctx: &mut ScriptContext) -> ScriptResult {
        self.ticks += 1;
        let now: u32 = ctx.call(GET_GAME_TIMER, NO_ARGS)?;
        tracing::info!(script = %ctx.name(), tick = self.ticks, game_ms = now, "clock");
        Ok(())
    }
}

/// Spawns a vehicle in front of the player on its hotkey
pub struct Spawner {
    hotkey: Keys,
    spawned: Vec<Vehicle>,
}

impl Default for Spawner {
    fn default() -> Self {
        Self {
            hotkey: Keys::function(5).unwrap_or(Keys::F1),
            spawned: Vec::new(),
        }
    }
}

impl Spawner {
    fn spawn(&mut self, ctx: &mut ScriptContext) -> ScriptResult {
        let model_name = ctx.settings().get_or("Spawner", "Model", String::from("adder"));
        let player: Ped = ctx.call(PLAYER_PED_ID, NO_ARGS)?;
        let position: Vector3 = ctx.call(GET_ENTITY_COORDS, [player])?;
        let model: u32 = ctx.call(GET_HASH_KEY, [model_name.as_str()])?;

        let mut args = vec![NativeArg::from(model)];
        args.extend(position.to_args());
        args.extend([NativeArg::from(0.0f32), true.into(), false.into()]);
        let vehicle: Vehicle = ctx.call(CREATE_VEHICLE, args)?;

        self.spawned.push(vehicle);
        ctx.invoke(
            SHOW_NOTIFICATION,
            [format!("Spawned {} ({:#x})", model_name, vehicle.handle())],
        )
    }
}

impl Script for Spawner {
    fn on_start(&mut self, ctx: &mut ScriptContext) -> ScriptResult {
        if let Some(key) = ctx.settings().get::<Keys>("Spawner", "Hotkey")? {
            self.hotkey = key;
        }
        tracing::info!(script = %ctx.name(), hotkey = %self.hotkey, "spawner ready");
        Ok(())
    }

    fn on_tick(&mut self, _: &mut ScriptContext) -> ScriptResult {
        Ok(())
    }

    fn on_key_down(&mut self, ctx: &mut ScriptContext, event: KeyEvent) -> ScriptResult {
        if event.key == self.hotkey {
            self.spawn(ctx)?;
        }
        Ok(())
    }

    fn on_aborted(&mut self, ctx: &ScriptContext) {
        tracing::info!(script = %ctx.name(), spawned = self.spawned.len(), "spawner stopped");
    }
}

/// Never hands control back
#[derive(Default)]
pub struct Hung;

impl Script for Hung {
    fn on_tick(&mut self, _: &mut ScriptContext) -> ScriptResult {
        loop {
            std::thread::sleep(Duration::from_secs(1));
        }
    }
}

pub fn registry(hang: bool) -> ScriptRegistry {
    let mut registry = ScriptRegistry::new();
    registry
        .add(ScriptDescriptor::new::<Spawner>("Spawner").depends_on("Clock"))
        .register::<Clock>("Clock");
    if hang {
        registry.register::<Hung>("Hung");
    }
    registry
}
