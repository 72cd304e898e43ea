use tabled::Tabled;

use wifimgr_core::{CoreError, Fleet, SiteRef};

use crate::cli::{GlobalOpts, SitesArgs};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "API")]
    label: String,
    #[tabled(rename = "Vendor")]
    vendor: String,
    #[tabled(rename = "Country")]
    country: String,
}

impl From<&SiteRef> for SiteRow {
    fn from(s: &SiteRef) -> Self {
        Self {
            name: s.site.name.clone(),
            id: s.site.id.clone(),
            label: s.label.clone(),
            vendor: s.vendor.clone(),
            country: s.site.country_code.clone().unwrap_or_default(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(fleet: &Fleet, args: &SitesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let accessor = fleet.accessor();
    let sites = match (&args.name, &args.api) {
        (None, api) => accessor.all_sites(api.as_deref())?,
        (Some(name), Some(api)) => vec![accessor.site_by_name_and_api(name, api)?],
        (Some(name), None) => {
            let matches = accessor.find_exact_site_matches(name);
            if matches.is_empty() {
                return Err(CoreError::NotFound {
                    entity_type: "site",
                    identifier: name.clone(),
                }
                .into());
            }
            // A name shared across APIs lists every match.
            matches
        }
    };

    let out = output::render_list(global.output, &sites, SiteRow::from)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
