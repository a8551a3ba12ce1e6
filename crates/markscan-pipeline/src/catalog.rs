//! Menu data: item identifiers, catalogs, and prices.
//!
//! Every orderable item is a [`MenuItem`] variant. Labels are display
//! text only; prices and catalog positions are keyed by the variant, so
//! two spellings of the same name can never fall out of sync.
//!
//! A [`Catalog`] is position-significant: entry `i` belongs to the
//! `i`-th mappable bubble in reading order. The [`Menu`] bundles the
//! Form A and Form B catalogs with a [`PriceTable`] and derives the
//! two combined catalogs (fallback and flat) from them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::FormVariant;

macro_rules! menu_items {
    ($($variant:ident => $label:literal,)*) => {
        /// Stable identifier for every item printed on either form.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum MenuItem {
            $(
                #[doc = $label]
                $variant,
            )*
        }

        impl MenuItem {
            /// Every item, Form A items first, each form in printed order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)*];

            /// Display name as printed on the form.
            #[must_use]
            pub const fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)*
                }
            }
        }
    };
}

menu_items! {
    WhtRc => "WhtRc",
    Bangsi => "Bangsi",
    TnaPng => "TnaPng",
    PnkBagn => "PnkBagn",
    Bulalo => "Bulalo",
    MacChs => "MacChs",
    OvrBngs => "OvrBngs",
    Carbo => "Carbo",
    OrgChk => "OrgChk",
    PltWhtRc => "PltWhtRc",
    RbBina => "RB-Bina",
    ViktoriasClassic => "Viktoria's Classic",
    SngTun => "SngTun",
    Alfrdo => "Alfrdo",
    Tapsi => "Tapsi",
    SzTofu => "SzTofu",
    Porksi => "Porksi",
    PrkSsg => "PrkSsg",
    SprRc => "SprRc",
    Lechsi => "Lechsi",
    Fst3 => "Fst3",
    ParmesanWings => "Parmesan Wings",
    CrispyDiniguanWithRice => "Crispy Diniguan w/ Rice",
    ChkSsg => "ChkSsg",
    PrkRc => "PrkRc",
    VktChk => "VktChk",
    BcnEggChs => "BcnEggChs",
    BgrRc => "BgrRc",
    PltGrlcRc => "PltGrlcRc",
    BfKald => "BfKald",
    ChickBul => "ChickBul",
    ChkAndMoj => "Chk&Moj",
    RbKk => "RB-KK",
    Fst2 => "Fst2",
    SisiSi => "SisiSi",
    CalAndFrs => "Cal&Frs",
    GrnSld => "GrnSld",
    OrgChkR => "OrgChkR",
    ChkFil => "ChkFil",
    Chksi => "Chksi",
    TstBrd => "TstBrd",
    SngBab => "SngBab",
    Fst1 => "Fst1",
    RbBulDng => "RB-BulDng",
    ClbHse => "ClbHse",
    Liemsi => "Liemsi",
    RbTofu => "RB-Tofu",
    AmpCar => "AmpCar",
    Bagn => "Bagn",
    Htdog => "Htdog",
    Mojos => "Mojos",
    TndRc => "TndRc",
    RbKald => "RB-Kald",
    Chopsy => "Chopsy",
    FshFil => "FshFil",
    Hotsi => "Hotsi",
    Longsi => "Longsi",
    BtrShrp => "BtrShrp",
    CrisKk => "CrisKK",
    HnyWngs => "HnyWngs",
    Tocsi => "Tocsi",
    Spag => "Spag",
    CrsPata => "CrsPata",
    TbnRc => "TbnRc",
    Egg => "Egg",
    CdnBlu => "CdnBlu",
    Nachos => "Nachos",
    SngHip => "SngHip",
    GrlcRc => "GrlcRc",
    Fst4 => "Fst4",
    ViktoriasCheesyBacon => "Viktoria's Cheesy Bacon",
    FishAndMoj => "Fish&Moj",
    FrFrs => "FrFrs",
    ChkTapa => "ChkTapa",
    BufWngs => "BufWngs",
    ViktoriasDoubleCheesyBacon => "Viktoria's Double Cheesy Bacon",
    HamEggChs => "HamEggChs",
    BfBroc => "BfBroc",
    CrisDng => "CrisDng",
}

impl std::fmt::Display for MenuItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Form A items, column by column, top to bottom.
pub const FORM_A_ITEMS: [MenuItem; 41] = {
    use MenuItem::*;
    [
        // Column 1
        WhtRc, Bangsi, TnaPng, PnkBagn, Bulalo, MacChs, OvrBngs, Carbo, OrgChk, PltWhtRc, RbBina,
        ViktoriasClassic, SngTun, Alfrdo,
        // Column 2
        Tapsi, SzTofu, Porksi, PrkSsg, SprRc, Lechsi, Fst3, ParmesanWings, CrispyDiniguanWithRice,
        ChkSsg, PrkRc, VktChk, BcnEggChs, BgrRc, PltGrlcRc, BfKald,
        // Column 3
        ChickBul, ChkAndMoj, RbKk, Fst2, SisiSi, CalAndFrs, GrnSld, OrgChkR, ChkFil, Chksi, TstBrd,
    ]
};

/// Form B items, column by column, top to bottom.
pub const FORM_B_ITEMS: [MenuItem; 38] = {
    use MenuItem::*;
    [
        // Column 1
        SngBab, Fst1, RbBulDng, ClbHse, Liemsi, RbTofu, AmpCar, Bagn, Htdog, Mojos, TndRc, RbKald,
        Chopsy, FshFil,
        // Column 2
        Hotsi, Longsi, BtrShrp, CrisKk, HnyWngs, Tocsi, Spag, CrsPata, TbnRc, Egg, CdnBlu, Nachos,
        SngHip, GrlcRc, Fst4, ViktoriasCheesyBacon,
        // Column 3
        FishAndMoj, FrFrs, ChkTapa, BufWngs, ViktoriasDoubleCheesyBacon, HamEggChs, BfBroc, CrisDng,
    ]
};

/// Unit prices in whole currency units.
const DEFAULT_PRICES: [(MenuItem, u64); 79] = {
    use MenuItem::*;
    [
        (WhtRc, 30),
        (Bangsi, 145),
        (TnaPng, 320),
        (PnkBagn, 510),
        (Bulalo, 510),
        (MacChs, 180),
        (OvrBngs, 420),
        (Carbo, 190),
        (OrgChk, 460),
        (PltWhtRc, 110),
        (RbBina, 190),
        (ViktoriasClassic, 220),
        (SngTun, 490),
        (Alfrdo, 230),
        (Tapsi, 150),
        (SzTofu, 190),
        (Porksi, 155),
        (PrkSsg, 230),
        (SprRc, 290),
        (Lechsi, 160),
        (Fst3, 1889),
        (ParmesanWings, 240),
        (CrispyDiniguanWithRice, 170),
        (ChkSsg, 230),
        (PrkRc, 250),
        (VktChk, 490),
        (BcnEggChs, 150),
        (BgrRc, 180),
        (PltGrlcRc, 120),
        (BfKald, 505),
        (ChickBul, 160),
        (ChkAndMoj, 270),
        (RbKk, 230),
        (Fst2, 1669),
        (SisiSi, 140),
        (CalAndFrs, 300),
        (GrnSld, 230),
        (OrgChkR, 170),
        (ChkFil, 140),
        (Chksi, 150),
        (TstBrd, 30),
        (SngBab, 495),
        (Fst1, 1449),
        (RbBulDng, 160),
        (ClbHse, 180),
        (Liemsi, 160),
        (RbTofu, 160),
        (AmpCar, 460),
        (Bagn, 360),
        (Htdog, 80),
        (Mojos, 120),
        (TndRc, 290),
        (RbKald, 250),
        (Chopsy, 420),
        (FshFil, 170),
        (Hotsi, 90),
        (Longsi, 170),
        (BtrShrp, 505),
        (CrisKk, 505),
        (HnyWngs, 220),
        (Tocsi, 140),
        (Spag, 210),
        (CrsPata, 800),
        (TbnRc, 290),
        (Egg, 60),
        (CdnBlu, 170),
        (Nachos, 205),
        (SngHip, 490),
        (GrlcRc, 35),
        (Fst4, 1779),
        (ViktoriasCheesyBacon, 280),
        (FishAndMoj, 260),
        (FrFrs, 80),
        (ChkTapa, 140),
        (BufWngs, 220),
        (ViktoriasDoubleCheesyBacon, 350),
        (HamEggChs, 150),
        (BfBroc, 505),
        (CrisDng, 495),
    ]
};

// ───────────────────────── Price ─────────────────────────────────────

/// A monetary amount stored as integer cents.
///
/// Sums are exact for any order made of prices up to [`Price::MAX`];
/// beyond `u64` range they saturate. Serializes as a decimal number of
/// currency units (`145.5`), displays with two decimals (`145.50`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(u64);

impl Price {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Largest price accepted from a menu file: one billion units.
    pub const MAX: Self = Self(1_000_000_000 * 100);

    /// Build a price from cents.
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Build a price from whole currency units.
    #[must_use]
    pub const fn from_units(units: u64) -> Self {
        Self(units.saturating_mul(100))
    }

    /// The amount in cents.
    #[must_use]
    pub const fn cents(self) -> u64 {
        self.0
    }

    /// The amount in currency units.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_units(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl std::ops::Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl std::iter::Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, p| acc + p)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Price {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_units())
    }
}

impl<'de> Deserialize<'de> for Price {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let units = f64::deserialize(deserializer)?;
        if !units.is_finite() || units < 0.0 {
            return Err(serde::de::Error::custom(
                "price must be a finite, non-negative number",
            ));
        }
        if units > Self::MAX.as_units() {
            return Err(serde::de::Error::custom(format_args!(
                "price {units} exceeds the maximum of {}",
                Self::MAX
            )));
        }
        Ok(Self((units * 100.0).round() as u64))
    }
}

// ───────────────────────── Catalog ───────────────────────────────────

/// One position in a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogEntry {
    /// An orderable item.
    Item(MenuItem),
    /// Placeholder for a selector bubble in a combined catalog.
    Selector(FormVariant),
}

impl CatalogEntry {
    /// Display name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Item(item) => item.label(),
            Self::Selector(FormVariant::FormA) => "Form A",
            Self::Selector(FormVariant::FormB) => "Form B",
            Self::Selector(FormVariant::Unknown) => "Unknown form",
        }
    }
}

impl From<MenuItem> for CatalogEntry {
    fn from(item: MenuItem) -> Self {
        Self::Item(item)
    }
}

/// An ordered, position-significant list of entries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog(Vec<CatalogEntry>);

impl Catalog {
    /// Create a catalog from entries.
    #[must_use]
    pub const fn new(entries: Vec<CatalogEntry>) -> Self {
        Self(entries)
    }

    /// Create a catalog of plain items.
    #[must_use]
    pub fn from_items(items: &[MenuItem]) -> Self {
        Self(items.iter().copied().map(CatalogEntry::Item).collect())
    }

    /// The printed Form A catalog (41 items).
    #[must_use]
    pub fn form_a() -> Self {
        Self::from_items(&FORM_A_ITEMS)
    }

    /// The printed Form B catalog (38 items).
    #[must_use]
    pub fn form_b() -> Self {
        Self::from_items(&FORM_B_ITEMS)
    }

    /// Catalog used when the form could not be identified.
    ///
    /// Starts with one placeholder per selector bubble so the physical
    /// Form A bubbles keep their names when no circle is skipped.
    #[must_use]
    pub fn fallback(form_a: &Self, form_b: &Self) -> Self {
        let mut entries = Vec::with_capacity(2 + form_a.len() + form_b.len());
        entries.push(CatalogEntry::Selector(FormVariant::FormA));
        entries.push(CatalogEntry::Selector(FormVariant::FormB));
        entries.extend_from_slice(&form_a.0);
        entries.extend_from_slice(&form_b.0);
        Self(entries)
    }

    /// Catalog for single-list forms without selector bubbles.
    #[must_use]
    pub fn flat(form_a: &Self, form_b: &Self) -> Self {
        Self([form_a.0.as_slice(), form_b.0.as_slice()].concat())
    }

    /// Entry at a catalog position.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<CatalogEntry> {
        self.0.get(index).copied()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All entries in order.
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.0
    }

    /// Display names in order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.0.iter().map(|e| e.label().to_owned()).collect()
    }
}

// ───────────────────────── Prices ────────────────────────────────────

/// Unit prices keyed by item, with a fallback for anything unlisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PriceTableDocument", into = "PriceTableDocument")]
pub struct PriceTable {
    prices: HashMap<MenuItem, Price>,
    fallback: Price,
}

impl PriceTable {
    /// Price charged for entries without a table entry.
    pub const DEFAULT_FALLBACK: Price = Price::from_units(100);

    /// An empty table with the given fallback price.
    #[must_use]
    pub fn new(fallback: Price) -> Self {
        Self {
            prices: HashMap::new(),
            fallback,
        }
    }

    /// Set an item's price, returning the updated table.
    #[must_use]
    pub fn with_price(mut self, item: MenuItem, price: Price) -> Self {
        self.prices.insert(item, price);
        self
    }

    /// Remove an item's price so it resolves to the fallback.
    pub fn remove(&mut self, item: MenuItem) -> Option<Price> {
        self.prices.remove(&item)
    }

    /// The listed price of an item, if any.
    #[must_use]
    pub fn get(&self, item: MenuItem) -> Option<Price> {
        self.prices.get(&item).copied()
    }

    /// The fallback price.
    #[must_use]
    pub const fn fallback(&self) -> Price {
        self.fallback
    }

    /// The unit price of a catalog entry.
    ///
    /// Selector placeholders and unlisted items resolve to the fallback.
    #[must_use]
    pub fn price_of(&self, entry: CatalogEntry) -> Price {
        match entry {
            CatalogEntry::Item(item) => self.get(item).unwrap_or(self.fallback),
            CatalogEntry::Selector(_) => self.fallback,
        }
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            prices: DEFAULT_PRICES
                .iter()
                .map(|&(item, units)| (item, Price::from_units(units)))
                .collect(),
            fallback: Self::DEFAULT_FALLBACK,
        }
    }
}

/// Serde form of [`PriceTable`]: a sorted entry list, so output is
/// stable and keys need not be strings.
#[derive(Serialize, Deserialize)]
struct PriceTableDocument {
    fallback: Price,
    prices: Vec<PriceEntry>,
}

#[derive(Serialize, Deserialize)]
struct PriceEntry {
    item: MenuItem,
    price: Price,
}

impl From<PriceTableDocument> for PriceTable {
    fn from(doc: PriceTableDocument) -> Self {
        Self {
            prices: doc.prices.into_iter().map(|e| (e.item, e.price)).collect(),
            fallback: doc.fallback,
        }
    }
}

impl From<PriceTable> for PriceTableDocument {
    fn from(table: PriceTable) -> Self {
        let mut prices: Vec<PriceEntry> = table
            .prices
            .into_iter()
            .map(|(item, price)| PriceEntry { item, price })
            .collect();
        prices.sort_by_key(|e| e.item);
        Self {
            fallback: table.fallback,
            prices,
        }
    }
}

// ───────────────────────── Menu ──────────────────────────────────────

/// Everything the menu mapper needs: both printed catalogs, the two
/// combined catalogs derived from them, and prices.
///
/// Read-only once built; share it between threads behind `&` or `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MenuDocument", into = "MenuDocument")]
pub struct Menu {
    form_a: Catalog,
    form_b: Catalog,
    fallback: Catalog,
    flat: Catalog,
    prices: PriceTable,
}

impl Menu {
    /// Build a menu, deriving the fallback and flat catalogs.
    #[must_use]
    pub fn new(form_a: Catalog, form_b: Catalog, prices: PriceTable) -> Self {
        let fallback = Catalog::fallback(&form_a, &form_b);
        let flat = Catalog::flat(&form_a, &form_b);
        Self {
            form_a,
            form_b,
            fallback,
            flat,
            prices,
        }
    }

    /// The Form A catalog.
    #[must_use]
    pub const fn form_a(&self) -> &Catalog {
        &self.form_a
    }

    /// The Form B catalog.
    #[must_use]
    pub const fn form_b(&self) -> &Catalog {
        &self.form_b
    }

    /// Selector placeholders followed by Form A and Form B.
    #[must_use]
    pub const fn fallback(&self) -> &Catalog {
        &self.fallback
    }

    /// Form A followed by Form B.
    #[must_use]
    pub const fn flat(&self) -> &Catalog {
        &self.flat
    }

    /// The price table.
    #[must_use]
    pub const fn prices(&self) -> &PriceTable {
        &self.prices
    }
}

impl Default for Menu {
    fn default() -> Self {
        Self::new(Catalog::form_a(), Catalog::form_b(), PriceTable::default())
    }
}

#[derive(Serialize, Deserialize)]
struct MenuDocument {
    form_a: Catalog,
    form_b: Catalog,
    prices: PriceTable,
}

impl From<MenuDocument> for Menu {
    fn from(doc: MenuDocument) -> Self {
        Self::new(doc.form_a, doc.form_b, doc.prices)
    }
}

impl From<Menu> for MenuDocument {
    fn from(menu: Menu) -> Self {
        Self {
            form_a: menu.form_a,
            form_b: menu.form_b,
            prices: menu.prices,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn catalog_sizes_match_printed_forms() {
        let menu = Menu::default();
        assert_eq!(menu.form_a().len(), 41);
        assert_eq!(menu.form_b().len(), 38);
        assert_eq!(menu.fallback().len(), 2 + 41 + 38);
        assert_eq!(menu.flat().len(), 41 + 38);
    }

    #[test]
    fn forms_partition_all_items() {
        let a: HashSet<MenuItem> = FORM_A_ITEMS.iter().copied().collect();
        let b: HashSet<MenuItem> = FORM_B_ITEMS.iter().copied().collect();
        assert_eq!(a.len(), FORM_A_ITEMS.len(), "duplicate in Form A");
        assert_eq!(b.len(), FORM_B_ITEMS.len(), "duplicate in Form B");
        assert!(a.is_disjoint(&b));
        assert_eq!(a.len() + b.len(), MenuItem::ALL.len());
    }

    #[test]
    fn every_item_has_a_default_price() {
        let table = PriceTable::default();
        for &item in MenuItem::ALL {
            assert!(table.get(item).is_some(), "{item} has no price");
        }
    }

    #[test]
    fn labels_with_apostrophes_resolve_real_prices() {
        let table = PriceTable::default();
        assert_eq!(
            table.price_of(MenuItem::ViktoriasClassic.into()),
            Price::from_units(220)
        );
        assert_eq!(
            table.price_of(MenuItem::ViktoriasDoubleCheesyBacon.into()),
            Price::from_units(350)
        );
    }

    #[test]
    fn unlisted_item_resolves_to_fallback() {
        let mut table = PriceTable::default();
        table.remove(MenuItem::Bulalo);
        assert_eq!(
            table.price_of(MenuItem::Bulalo.into()),
            Price::from_units(100)
        );
    }

    #[test]
    fn selector_placeholder_resolves_to_fallback() {
        let table = PriceTable::new(Price::from_cents(4_250));
        assert_eq!(
            table.price_of(CatalogEntry::Selector(FormVariant::FormB)),
            Price::from_cents(4_250)
        );
    }

    #[test]
    fn fallback_catalog_starts_with_selectors() {
        let menu = Menu::default();
        let fallback = menu.fallback();
        assert_eq!(
            fallback.get(0),
            Some(CatalogEntry::Selector(FormVariant::FormA))
        );
        assert_eq!(
            fallback.get(1),
            Some(CatalogEntry::Selector(FormVariant::FormB))
        );
        assert_eq!(fallback.get(2), Some(CatalogEntry::Item(MenuItem::WhtRc)));
        assert_eq!(
            fallback.get(2 + 41),
            Some(CatalogEntry::Item(MenuItem::SngBab))
        );
    }

    #[test]
    fn flat_catalog_is_plain_concatenation() {
        let menu = Menu::default();
        assert_eq!(menu.flat().get(0), Some(MenuItem::WhtRc.into()));
        assert_eq!(menu.flat().get(41), Some(MenuItem::SngBab.into()));
        assert_eq!(menu.flat().get(79), None);
    }

    #[test]
    fn price_sum_is_exact() {
        let total: Price = [
            Price::from_cents(10),
            Price::from_cents(20),
            Price::from_cents(70),
        ]
        .into_iter()
        .sum();
        assert_eq!(total, Price::from_units(1));
        assert_eq!(total.to_string(), "1.00");
    }

    #[test]
    fn price_display_pads_cents() {
        assert_eq!(Price::from_cents(14_505).to_string(), "145.05");
        assert_eq!(Price::ZERO.to_string(), "0.00");
    }

    #[test]
    fn price_serializes_as_units() {
        let json = serde_json::to_string(&Price::from_cents(14_550)).unwrap();
        assert_eq!(json, "145.5");
        let back: Price = serde_json::from_str("0.1").unwrap();
        assert_eq!(back, Price::from_cents(10));
    }

    #[test]
    fn negative_price_is_rejected() {
        assert!(serde_json::from_str::<Price>("-1.0").is_err());
    }

    #[test]
    fn oversized_price_is_rejected() {
        let err = serde_json::from_str::<Price>("1.0e17").unwrap_err();
        assert!(err.to_string().contains("exceeds"), "{err}");
        let max: Price = serde_json::from_str("1000000000").unwrap();
        assert_eq!(max, Price::MAX);
    }

    #[test]
    fn order_of_maximum_prices_sums_exactly() {
        let line_count = 2 + 41 + 38;
        let total: Price = std::iter::repeat_n(Price::MAX, line_count).sum();
        assert_eq!(total.cents(), Price::MAX.cents() * 81);
    }

    #[test]
    fn price_addition_saturates_instead_of_wrapping() {
        let near_limit = Price::from_cents(u64::MAX - 1);
        assert_eq!((near_limit + near_limit).cents(), u64::MAX);
        assert_eq!(Price::from_units(u64::MAX).cents(), u64::MAX);
    }

    #[test]
    fn menu_round_trips_and_rederives_combined_catalogs() {
        let menu = Menu::default();
        let json = serde_json::to_string(&menu).unwrap();
        assert!(!json.contains("fallback\":["), "combined catalogs are derived");
        let back: Menu = serde_json::from_str(&json).unwrap();
        assert_eq!(back, menu);
    }
}
