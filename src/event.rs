use serde::Serialize;

/// Single polarity event from the eDVS camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    pub x: u16,
    pub y: u16,
    pub timestamp: i64,
    pub polarity: i8, // -1 or +1
}

impl Event {
    pub fn new(x: u16, y: u16, timestamp: i64, polarity: i8) -> Self {
        Self {
            x,
            y,
            timestamp,
            polarity,
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\t{}\t{}\t{}", self.x, self.y, self.timestamp, self.polarity)
    }
}

/// Events delivered together by the capture source, in emission order.
pub type EventBatch = Vec<Event>;

/// Cleaned batch as parallel columns, the shape handed to consumers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CleanBatch {
    pub x: Vec<u16>,
    pub y: Vec<u16>,
    pub timestamp: Vec<i64>,
    pub polarity: Vec<i8>,
}

impl CleanBatch {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            x: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
            timestamp: Vec::with_capacity(n),
            polarity: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, event: &Event) {
        self.x.push(event.x);
        self.y.push(event.y);
        self.timestamp.push(event.timestamp);
        self.polarity.push(event.polarity);
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Iterate the rows back as events.
    pub fn events(&self) -> impl Iterator<Item = Event> + '_ {
        (0..self.len()).map(move |i| {
            Event::new(self.x[i], self.y[i], self.timestamp[i], self.polarity[i])
        })
    }
}

impl<'a> FromIterator<&'a Event> for CleanBatch {
    fn from_iter<I: IntoIterator<Item = &'a Event>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut batch = CleanBatch::with_capacity(iter.size_hint().0);
        for event in iter {
            batch.push(event);
        }
        batch
    }
}
