//! Module listing parser
//!
//! Turns the HTML table returned by the portal's period form into
//! [`CatalogRow`]s. Incomplete or non-numeric rows are skipped.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::types::{CatalogRow, FormatTag, ModuleCode};
use crate::constants::{catalog, selectors};
use crate::errors::{CatalogError, CatalogResult};

fn selector(css: &str) -> CatalogResult<Selector> {
    Selector::parse(css).map_err(|_| CatalogError::InvalidSelector {
        selector: css.to_string(),
    })
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Parse a year listing
///
/// Relative hrefs are resolved against `base_url`. A page without a table
/// yields no rows.
pub fn parse_listing(html: &str, base_url: &Url) -> CatalogResult<Vec<CatalogRow>> {
    let document = Html::parse_document(html);

    let table_sel = selector(selectors::TABLE_SELECTOR)?;
    let row_sel = selector(selectors::ROW_SELECTOR)?;
    let cell_sel = selector(selectors::CELL_SELECTOR)?;
    let link_sel = selector(selectors::LINK_SELECTOR)?;

    let Some(table) = document.select(&table_sel).next() else {
        tracing::debug!("Listing page has no table");
        return Ok(Vec::new());
    };

    let mut rows = Vec::new();

    // first row is the header
    for row_el in table.select(&row_sel).skip(1) {
        let cells: Vec<ElementRef<'_>> = row_el.select(&cell_sel).collect();
        if cells.len() < catalog::MIN_ROW_CELLS {
            continue;
        }

        let Ok(year) = cell_text(&cells[1]).parse::<u16>() else {
            tracing::debug!("Skipping listing row with year '{}'", cell_text(&cells[1]));
            continue;
        };
        let Some(module_code) = ModuleCode::parse(&cell_text(&cells[5])) else {
            tracing::debug!(
                "Skipping listing row with module code '{}'",
                cell_text(&cells[5])
            );
            continue;
        };

        let ficha = cells[7]
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| base_url.join(href).ok());

        let mut links = Vec::new();
        for cell in &cells[catalog::FIRST_DOWNLOAD_CELL..] {
            let Some(anchor) = cell.select(&link_sel).next() else {
                continue;
            };
            let Some(href) = anchor.value().attr("href").filter(|h| !h.trim().is_empty()) else {
                continue;
            };
            let title = anchor.value().attr("title").unwrap_or("");

            let Some(format) = FormatTag::from_link(title, href) else {
                tracing::debug!("Unrecognized download link '{}' ({})", href, title);
                continue;
            };
            match base_url.join(href.trim()) {
                Ok(url) => links.push((format, url)),
                Err(e) => tracing::debug!("Skipping download link '{}': {}", href, e),
            }
        }

        rows.push(CatalogRow {
            sequence: cell_text(&cells[0]),
            year,
            period: cell_text(&cells[2]),
            survey_code: cell_text(&cells[3]),
            survey_name: cell_text(&cells[4]),
            module_code,
            module_name: cell_text(&cells[6]),
            ficha,
            links,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
<html><body>
<table>
  <tr><th>Nro</th><th>Año</th><th>Periodo</th><th>Cod</th><th>Encuesta</th><th>Cod. Módulo</th><th>Módulo</th><th>Ficha</th><th>SPSS</th><th>STATA</th><th>CSV</th><th>DBF</th></tr>
  <tr>
    <td>1</td><td>2014</td><td>Anual</td><td>440</td><td>ENAHO</td><td>1</td>
    <td>Características de la Vivienda y del Hogar</td>
    <td><a href="fichaTecnica.asp?cod=440">Ficha</a></td>
    <td><a href="SPSS/440-Modulo01.zip" title="Descargar SPSS">x</a></td>
    <td><a href="STATA/440-Modulo01.zip" title="Descargar STATA">x</a></td>
    <td><a href="CSV/440-Modulo01.zip">x</a></td>
    <td></td>
  </tr>
  <tr>
    <td>2</td><td>2014</td><td>Anual</td><td>440</td><td>ENAHO</td><td>5</td>
    <td>Empleo e Ingresos</td><td></td>
  </tr>
  <tr><td>3</td><td>2014</td><td>Anual</td></tr>
  <tr>
    <td>4</td><td>----</td><td>Anual</td><td>440</td><td>ENAHO</td><td>7</td>
    <td>Gastos</td><td></td>
  </tr>
</table>
</body></html>
"#;

    fn base() -> Url {
        Url::parse("https://proyectos.inei.gob.pe/iinei/srienaho/").unwrap()
    }

    #[test]
    fn test_parse_listing_rows() {
        let rows = parse_listing(LISTING, &base()).unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.sequence, "1");
        assert_eq!(first.year, 2014);
        assert_eq!(first.module_code.as_str(), "001");
        assert_eq!(first.module_name, "Características de la Vivienda y del Hogar");
        assert_eq!(
            first.ficha.as_ref().unwrap().as_str(),
            "https://proyectos.inei.gob.pe/iinei/srienaho/fichaTecnica.asp?cod=440"
        );

        let formats: Vec<FormatTag> = first.links.iter().map(|(f, _)| *f).collect();
        assert_eq!(formats, vec![FormatTag::Spss, FormatTag::Stata, FormatTag::Csv]);
        assert_eq!(
            first.links[2].1.as_str(),
            "https://proyectos.inei.gob.pe/iinei/srienaho/CSV/440-Modulo01.zip"
        );
    }

    #[test]
    fn test_row_without_links_is_kept() {
        let rows = parse_listing(LISTING, &base()).unwrap();
        let second = &rows[1];
        assert_eq!(second.module_code.as_str(), "005");
        assert!(second.links.is_empty());
        assert!(second.ficha.is_none());
    }

    #[test]
    fn test_page_without_table() {
        let rows = parse_listing("<html><body>Sin datos</body></html>", &base()).unwrap();
        assert!(rows.is_empty());
    }
}
