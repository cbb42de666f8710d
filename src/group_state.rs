//! Tri-state group classification and its aggregation.
//!
//! A [`GroupState`] packs three independent [`TriState`] dimensions
//! (selection, positive filter, region selection) into a single byte, two
//! bits per dimension. [`GroupStateComputer`] folds the states of many tiles
//! or markers into the state of the whole group.

use serde::{Deserialize, Serialize};

/// None / Some / All classification of a group of markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TriState {
    #[default]
    None = 0,
    Some = 1,
    All = 2,
}

impl TriState {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => TriState::None,
            1 => TriState::Some,
            _ => TriState::All,
        }
    }

    /// Classify `matching` out of `total` members.
    pub fn from_counts(matching: usize, total: usize) -> Self {
        if matching == 0 {
            TriState::None
        } else if matching >= total {
            TriState::All
        } else {
            TriState::Some
        }
    }

    /// Merge two group classifications: unanimous states survive, any
    /// disagreement degrades to `Some`.
    pub fn merge(self, other: TriState) -> TriState {
        if self == other { self } else { TriState::Some }
    }
}

/// One of the three dimensions packed into a [`GroupState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupDimension {
    Selected,
    FilteredPositive,
    RegionSelected,
}

impl GroupDimension {
    pub const ALL: [GroupDimension; 3] = [
        GroupDimension::Selected,
        GroupDimension::FilteredPositive,
        GroupDimension::RegionSelected,
    ];

    const fn shift(self) -> u8 {
        match self {
            GroupDimension::Selected => 0,
            GroupDimension::FilteredPositive => 2,
            GroupDimension::RegionSelected => 4,
        }
    }

    const fn mask(self) -> u8 {
        0b11 << self.shift()
    }
}

/// Packed selection / filter / region-selection state.
///
/// ```
/// use tilecluster::{GroupState, TriState};
///
/// let state = GroupState::new()
///     .with_selected(TriState::All)
///     .with_region_selected(TriState::Some);
/// assert_eq!(state.selected(), TriState::All);
/// assert_eq!(state.filtered_positive(), TriState::None);
/// assert_eq!(state.region_selected(), TriState::Some);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GroupState(u8);

impl GroupState {
    /// All dimensions `None`.
    pub const NONE: GroupState = GroupState(0);

    pub fn new() -> Self {
        Self::NONE
    }

    /// Every dimension set to `state`.
    pub fn uniform(state: TriState) -> Self {
        let bits = state as u8;
        GroupState(bits | (bits << 2) | (bits << 4))
    }

    pub fn from_parts(
        selected: TriState,
        filtered_positive: TriState,
        region_selected: TriState,
    ) -> Self {
        GroupState::NONE
            .with_selected(selected)
            .with_filtered_positive(filtered_positive)
            .with_region_selected(region_selected)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn get(&self, dimension: GroupDimension) -> TriState {
        TriState::from_bits((self.0 & dimension.mask()) >> dimension.shift())
    }

    pub fn with(self, dimension: GroupDimension, state: TriState) -> Self {
        GroupState((self.0 & !dimension.mask()) | ((state as u8) << dimension.shift()))
    }

    pub fn selected(&self) -> TriState {
        self.get(GroupDimension::Selected)
    }

    pub fn filtered_positive(&self) -> TriState {
        self.get(GroupDimension::FilteredPositive)
    }

    pub fn region_selected(&self) -> TriState {
        self.get(GroupDimension::RegionSelected)
    }

    pub fn with_selected(self, state: TriState) -> Self {
        self.with(GroupDimension::Selected, state)
    }

    pub fn with_filtered_positive(self, state: TriState) -> Self {
        self.with(GroupDimension::FilteredPositive, state)
    }

    pub fn with_region_selected(self, state: TriState) -> Self {
        self.with(GroupDimension::RegionSelected, state)
    }
}

/// Aggregates group states, independently per dimension.
///
/// The first contribution to a dimension is taken verbatim. Later
/// contributions keep the aggregate only while they agree with it; the first
/// disagreement turns the dimension into `Some` for good. `All` therefore
/// survives only unanimous `All` input, and one `All` plus one `None` is
/// `Some`, exactly like two `Some` contributions.
///
/// The merge is symmetric, so `None` followed by `All` is `Some` as well.
/// Folding the raw flag bits with a bitwise OR would instead report `All` for
/// that pair, because `None` is encoded as zero. Callers after "any marker is
/// selected" should test the aggregate for `!= None` rather than OR the bits.
///
/// ```
/// use tilecluster::{GroupState, GroupStateComputer, TriState};
///
/// let mut computer = GroupStateComputer::new();
/// computer.add_state(GroupState::uniform(TriState::All));
/// computer.add_state(GroupState::uniform(TriState::None));
/// assert_eq!(computer.state(), GroupState::uniform(TriState::Some));
/// ```
#[derive(Debug, Clone, Default)]
pub struct GroupStateComputer {
    state: GroupState,
    seen: [bool; 3],
}

impl GroupStateComputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current aggregate. A cleared computer reports `None` everywhere.
    pub fn state(&self) -> GroupState {
        self.state
    }

    pub fn clear(&mut self) {
        self.state = GroupState::NONE;
        self.seen = [false; 3];
    }

    /// Feed all three dimensions of `state`.
    pub fn add_state(&mut self, state: GroupState) {
        for dimension in GroupDimension::ALL {
            self.add_dimension(dimension, state.get(dimension));
        }
    }

    pub fn add_selected_state(&mut self, state: GroupState) {
        self.add_dimension(GroupDimension::Selected, state.selected());
    }

    pub fn add_filtered_positive_state(&mut self, state: GroupState) {
        self.add_dimension(GroupDimension::FilteredPositive, state.filtered_positive());
    }

    pub fn add_region_selected_state(&mut self, state: GroupState) {
        self.add_dimension(GroupDimension::RegionSelected, state.region_selected());
    }

    fn add_dimension(&mut self, dimension: GroupDimension, incoming: TriState) {
        let slot = dimension.shift() as usize / 2;
        let merged = if self.seen[slot] {
            self.state.get(dimension).merge(incoming)
        } else {
            self.seen[slot] = true;
            incoming
        };
        self.state = self.state.with(dimension, merged);
    }
}

impl Extend<GroupState> for GroupStateComputer {
    fn extend<I: IntoIterator<Item = GroupState>>(&mut self, iter: I) {
        for state in iter {
            self.add_state(state);
        }
    }
}
