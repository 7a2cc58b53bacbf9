//! Provides ready to use [`NamedNodeRef`](oxrdf::NamedNodeRef)s for the vocabularies read by the engine.

pub mod ldt {
    //! [Linked Data Templates](https://atomgraph.github.io/Linked-Data-Templates/) vocabulary.
    use oxrdf::NamedNodeRef;

    /// The class of templates describing a single document resource.
    pub const TEMPLATE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://www.w3.org/ns/ldt#Template");
    /// The class of templates describing a paginated container of resources.
    pub const CONTAINER_TEMPLATE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://www.w3.org/ns/ldt#ContainerTemplate");
    /// The class of parameter declarations.
    pub const PARAMETER: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://www.w3.org/ns/ldt#Parameter");
    /// The URI path template matched against request paths.
    pub const MATCH: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://www.w3.org/ns/ldt#match");
    /// An optional fragment template appended to minted and state URIs.
    pub const FRAGMENT: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://www.w3.org/ns/ldt#fragment");
    /// Links a template to its stored read query.
    pub const QUERY: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://www.w3.org/ns/ldt#query");
    /// Links a template to its stored update.
    pub const UPDATE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://www.w3.org/ns/ldt#update");
    /// Links a template to one of its parameter declarations.
    pub const PARAM: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://www.w3.org/ns/ldt#param");
    /// Breaks ties between templates of equal match precedence.
    pub const PRIORITY: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://www.w3.org/ns/ldt#priority");
    /// Links a template to a super-template whose parameters it inherits.
    pub const EXTENDS: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://www.w3.org/ns/ldt#extends");
    /// A language tag the template can serve.
    pub const LANG: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://www.w3.org/ns/ldt#lang");
    /// The `Cache-Control` header value served with the template's responses.
    pub const CACHE_CONTROL: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://www.w3.org/ns/ldt#cacheControl");
    /// The predicate a parameter binds; its local name is the parameter's variable.
    pub const PREDICATE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://www.w3.org/ns/ldt#predicate");
    /// Marks a parameter as optional. Parameters are required unless stated otherwise.
    pub const OPTIONAL: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://www.w3.org/ns/ldt#optional");
    /// Allows a parameter to be bound more than once.
    pub const MULTI_VALUED: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://www.w3.org/ns/ldt#multiValued");
    /// The value used for a parameter left unbound by the request.
    pub const DEFAULT_VALUE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://www.w3.org/ns/ldt#defaultValue");
    /// The datatype of a parameter's values, or `rdfs:Resource` for IRI values.
    pub const VALUE_TYPE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("https://www.w3.org/ns/ldt#valueType");
}

pub mod sp {
    //! [SPIN SPARQL syntax](http://spinrdf.org/sp) vocabulary.
    use oxrdf::NamedNodeRef;

    /// The SPARQL text of a stored query or update.
    pub const TEXT: NamedNodeRef<'_> = NamedNodeRef::new_unchecked("http://spinrdf.org/sp#text");
}

pub mod spin {
    //! [SPIN modeling](http://spinrdf.org/spin) vocabulary.
    use oxrdf::NamedNodeRef;

    /// The `CONSTRUCT` query instantiating new members of the subject class.
    pub const CONSTRUCTOR: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://spinrdf.org/spin#constructor");
}

pub mod owl {
    //! [OWL](https://www.w3.org/TR/owl2-overview/) vocabulary.
    use oxrdf::NamedNodeRef;

    /// The class of OWL classes.
    pub const CLASS: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#Class");
    /// The class of property restrictions.
    pub const RESTRICTION: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#Restriction");
    /// The property a restriction constrains.
    pub const ON_PROPERTY: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#onProperty");
    /// The class all values of the restricted property belong to.
    pub const ALL_VALUES_FROM: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#allValuesFrom");
    /// Relates a property to its inverse.
    pub const INVERSE_OF: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#inverseOf");
    /// The list of classes an intersection class is built from.
    pub const INTERSECTION_OF: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#intersectionOf");
}
