//! Keyboard and mouse input
//!
//! [`InputCollector`] is owned by the application loop and fed winit events.
//! Once per frame it produces an immutable [`InputState`] snapshot which is
//! passed by reference to the camera and scene.

use std::collections::HashSet;

use cgmath::{Vector2, Zero};
use winit::event::{DeviceEvent, ElementState, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Input as seen by one frame
#[derive(Debug, Clone)]
pub struct InputState {
    keys_down: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    mouse_buttons_down: HashSet<MouseButton>,
    mouse_delta: Vector2<f32>,
}

impl Default for InputState {
    fn default() -> Self {
        Self {
            keys_down: HashSet::new(),
            keys_pressed: HashSet::new(),
            mouse_buttons_down: HashSet::new(),
            mouse_delta: Vector2::zero(),
        }
    }
}

impl InputState {
    /// Returns true if the key is currently held down.
    pub fn key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    /// Returns true if the key went down during this frame.
    pub fn key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    /// Returns true if the mouse button is currently held down.
    pub fn mouse_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons_down.contains(&button)
    }

    /// Accumulated raw mouse motion for this frame.
    pub fn mouse_delta(&self) -> Vector2<f32> {
        self.mouse_delta
    }

    /// Copy of this state with the per-frame transients cleared
    ///
    /// Used for the second and later fixed steps of a frame so that one mouse
    /// movement or key press is not applied several times.
    pub fn held_only(&self) -> Self {
        Self {
            keys_down: self.keys_down.clone(),
            keys_pressed: HashSet::new(),
            mouse_buttons_down: self.mouse_buttons_down.clone(),
            mouse_delta: Vector2::zero(),
        }
    }

    pub fn with_key_down(mut self, key: KeyCode) -> Self {
        self.keys_down.insert(key);
        self
    }

    pub fn with_key_pressed(mut self, key: KeyCode) -> Self {
        self.keys_down.insert(key);
        self.keys_pressed.insert(key);
        self
    }

    pub fn with_mouse_down(mut self, button: MouseButton) -> Self {
        self.mouse_buttons_down.insert(button);
        self
    }

    pub fn with_mouse_delta(mut self, dx: f32, dy: f32) -> Self {
        self.mouse_delta = Vector2::new(dx, dy);
        self
    }
}

/// Accumulates winit events between frames
#[derive(Debug, Default)]
pub struct InputCollector {
    current: InputState,
}

impl InputCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a window event and update the held key and button sets.
    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        let state = &mut self.current;
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => {
                            if state.keys_down.insert(key) {
                                state.keys_pressed.insert(key);
                            }
                        }
                        ElementState::Released => {
                            state.keys_down.remove(&key);
                        }
                    }
                }
            }
            WindowEvent::MouseInput { state: element, button, .. } => match element {
                ElementState::Pressed => {
                    state.mouse_buttons_down.insert(*button);
                }
                ElementState::Released => {
                    state.mouse_buttons_down.remove(button);
                }
            },
            // Releasing everything avoids keys stuck down after alt-tab
            WindowEvent::Focused(false) => {
                state.keys_down.clear();
                state.mouse_buttons_down.clear();
            }
            _ => {}
        }
    }

    /// Raw mouse motion arrives as a device event, unaffected by cursor grab.
    pub fn handle_device_event(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.current.mouse_delta += Vector2::new(delta.0 as f32, delta.1 as f32);
        }
    }

    /// Snapshot for this frame, then reset the per-frame transients.
    pub fn end_frame(&mut self) -> InputState {
        let snapshot = self.current.clone();
        self.current.keys_pressed.clear();
        self.current.mouse_delta = Vector2::zero();
        snapshot
    }

    pub fn is_mouse_down(&self, button: MouseButton) -> bool {
        self.current.mouse_down(button)
    }
}
