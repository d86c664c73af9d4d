//! Motion Queue
//!
//! Plays started motions against a [`ParameterBuffer`] with fade-in/fade-out
//! blending, and owns the priority reservation that decides whether a new
//! request may preempt what is playing.
//!
//! Starting a motion fades out every entry already in the queue; the new entry
//! fades in over its own fade-in time. Entries are removed once their end time
//! passes, firing their finished callback.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::animation::motion::{easing_sine, FinishedCallback, MotionClip, MotionHandle};
use crate::animation::parameters::ParameterBuffer;
use crate::animation::priority::Priority;

struct QueueEntry {
    handle: MotionHandle,
    label: String,
    clip: Rc<dyn MotionClip>,
    start_time: Option<f32>,
    end_time: Option<f32>,
    fade_out_seconds: f32,
    last_local_time: f32,
    finished: bool,
    on_finished: Option<FinishedCallback>,
}

impl QueueEntry {
    fn start_fade_out(&mut self, now: f32) {
        let seconds = self.clip.fade_out_time().max(0.0);
        let new_end = now + seconds;
        self.fade_out_seconds = seconds;
        if self.end_time.is_none_or(|end| new_end < end) {
            self.end_time = Some(new_end);
        }
    }

    fn weight(&self, now: f32, start: f32) -> f32 {
        let fade_in = self.clip.fade_in_time();
        let fade_in_weight = if fade_in <= 0.0 {
            1.0
        } else {
            easing_sine((now - start) / fade_in)
        };

        let fade_out_weight = match self.end_time {
            Some(end) if self.fade_out_seconds > 0.0 => {
                easing_sine((end - now) / self.fade_out_seconds)
            }
            _ => 1.0,
        };

        fade_in_weight * fade_out_weight
    }
}

/// A motion that left the queue during an update.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedMotion {
    pub handle: MotionHandle,
    pub label: String,
}

/// Result of one [`MotionQueue::update`].
#[derive(Debug, Default)]
pub struct MotionTick {
    /// Whether any entry was applied this frame.
    pub updated: bool,
    pub finished: SmallVec<[FinishedMotion; 2]>,
    /// User events fired by the clips this frame.
    pub events: Vec<String>,
}

pub struct MotionQueue {
    entries: Vec<QueueEntry>,
    current_priority: Priority,
    reserve_priority: Priority,
    user_time: f32,
    next_handle: u64,
}

impl Default for MotionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            current_priority: Priority::None,
            reserve_priority: Priority::None,
            user_time: 0.0,
            next_handle: 1,
        }
    }

    #[inline]
    #[must_use]
    pub fn current_priority(&self) -> Priority {
        self.current_priority
    }

    #[inline]
    #[must_use]
    pub fn reserve_priority(&self) -> Priority {
        self.reserve_priority
    }

    /// Unconditionally sets the reserved priority.
    pub fn set_reserve_priority(&mut self, priority: Priority) {
        self.reserve_priority = priority;
    }

    /// Reserves the motion slot for a request at `priority`.
    ///
    /// `Force` always succeeds. Any other priority must be strictly higher than
    /// both the playing and the reserved priority; on failure nothing changes.
    pub fn try_reserve(&mut self, priority: Priority) -> bool {
        if priority == Priority::Force {
            self.reserve_priority = Priority::Force;
            return true;
        }
        if !priority.admits_over(self.current_priority, self.reserve_priority) {
            return false;
        }
        self.reserve_priority = priority;
        true
    }

    /// Releases a reservation that will not be followed by a start.
    pub fn cancel_reservation(&mut self, priority: Priority) {
        if self.reserve_priority == priority {
            self.reserve_priority = Priority::None;
        }
    }

    /// Starts `clip`, fading out everything already playing.
    pub fn start(
        &mut self,
        clip: Rc<dyn MotionClip>,
        label: impl Into<String>,
        priority: Priority,
        on_finished: Option<FinishedCallback>,
    ) -> MotionHandle {
        if priority == self.reserve_priority {
            self.reserve_priority = Priority::None;
        }
        self.current_priority = priority;

        let now = self.user_time;
        for entry in &mut self.entries {
            entry.start_fade_out(now);
        }

        let handle = MotionHandle(self.next_handle);
        self.next_handle += 1;

        self.entries.push(QueueEntry {
            handle,
            label: label.into(),
            clip,
            start_time: None,
            end_time: None,
            fade_out_seconds: 0.0,
            last_local_time: 0.0,
            finished: false,
            on_finished,
        });
        handle
    }

    /// `true` when nothing is playing.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.entries.iter().all(|e| e.finished)
    }

    #[must_use]
    pub fn is_playing(&self, handle: MotionHandle) -> bool {
        self.entries.iter().any(|e| e.handle == handle && !e.finished)
    }

    /// Labels of the entries still in the queue, oldest first.
    pub fn playing_labels(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| !e.finished)
            .map(|e| e.label.as_str())
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry without firing callbacks and clears priorities.
    pub fn stop_all(&mut self) {
        self.entries.clear();
        self.current_priority = Priority::None;
        self.reserve_priority = Priority::None;
    }

    /// Advances queue time by `dt` and applies every live entry.
    pub fn update(&mut self, params: &mut ParameterBuffer, dt: f32) -> MotionTick {
        self.user_time += dt;
        let now = self.user_time;

        let mut tick = MotionTick {
            updated: !self.entries.is_empty(),
            ..MotionTick::default()
        };

        for entry in &mut self.entries {
            if entry.finished {
                continue;
            }

            let start = match entry.start_time {
                Some(start) => start,
                None => {
                    entry.start_time = Some(now);
                    if entry.end_time.is_none() {
                        entry.end_time = entry
                            .clip
                            .duration()
                            .filter(|d| *d > 0.0)
                            .map(|d| now + d);
                        entry.fade_out_seconds = entry.clip.fade_out_time().max(0.0);
                    }
                    now
                }
            };

            let local = now - start;
            let weight = entry.weight(now, start);
            entry.clip.apply(params, local, weight);

            tick.events
                .extend(entry.clip.events_between(entry.last_local_time, local));
            entry.last_local_time = local;

            if entry.end_time.is_some_and(|end| end <= now) {
                entry.finished = true;
            }
        }

        let mut index = 0;
        while index < self.entries.len() {
            if self.entries[index].finished {
                let mut entry = self.entries.remove(index);
                if let Some(callback) = entry.on_finished.take() {
                    callback(entry.handle);
                }
                tick.finished.push(FinishedMotion {
                    handle: entry.handle,
                    label: entry.label,
                });
            } else {
                index += 1;
            }
        }

        if self.entries.is_empty() {
            self.current_priority = Priority::None;
        }

        tick
    }
}
